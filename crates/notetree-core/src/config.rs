//! Explorer configuration types.

use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What to do with an optimistic local change when its persistence request fails.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FailurePolicy {
    /// Keep the local state and only report the failure.
    #[default]
    KeepLocal,
    /// Undo the local change if its target still exists.
    Revert,
}

/// Configuration for the explorer engine.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ExplorerConfig {
    /// Quiet period before an editor change is persisted, in milliseconds.
    #[builder(default = "400")]
    #[serde(default = "default_content_debounce_ms")]
    pub content_debounce_ms: u64,

    /// Reconciliation of failed optimistic mutations.
    #[builder(default)]
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Buffer size of the request completion channel.
    #[builder(default = "100")]
    #[serde(default = "default_channel_size")]
    pub channel_size: usize,

    /// Expand a directory after something is dropped into it.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub expand_on_drop: bool,

    /// Suffix appended to every page title.
    #[builder(default = "\"Note App\".to_string()")]
    #[serde(default = "default_app_title")]
    pub app_title: String,
}

fn default_content_debounce_ms() -> u64 {
    400
}

fn default_channel_size() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_app_title() -> String {
    "Note App".to_string()
}

fn check(content_debounce_ms: u64, channel_size: usize) -> Result<(), String> {
    if content_debounce_ms == 0 {
        return Err("Content debounce must be greater than zero".to_string());
    }
    if channel_size == 0 {
        return Err("Channel size must be greater than zero".to_string());
    }
    Ok(())
}

impl ExplorerConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        check(
            self.content_debounce_ms.unwrap_or_else(default_content_debounce_ms),
            self.channel_size.unwrap_or_else(default_channel_size),
        )
    }
}

impl ExplorerConfig {
    /// Create a new config builder.
    pub fn builder() -> ExplorerConfigBuilder {
        ExplorerConfigBuilder::default()
    }

    /// Check a config that did not come from the builder, e.g. one read from a file.
    pub fn validate(&self) -> Result<(), String> {
        check(self.content_debounce_ms, self.channel_size)
    }

    /// Debounce period as a [`Duration`].
    pub fn content_debounce(&self) -> Duration {
        Duration::from_millis(self.content_debounce_ms)
    }
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            content_debounce_ms: default_content_debounce_ms(),
            failure_policy: FailurePolicy::default(),
            channel_size: default_channel_size(),
            expand_on_drop: true,
            app_title: default_app_title(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ExplorerConfig::builder()
            .failure_policy(FailurePolicy::Revert)
            .content_debounce_ms(250u64)
            .build()
            .unwrap();

        assert_eq!(config.failure_policy, FailurePolicy::Revert);
        assert_eq!(config.content_debounce(), Duration::from_millis(250));
        assert_eq!(config.channel_size, 100);
        assert!(config.expand_on_drop);
    }

    #[test]
    fn test_config_builder_rejects_zero() {
        assert!(ExplorerConfig::builder().channel_size(0usize).build().is_err());
        assert!(ExplorerConfig::builder().content_debounce_ms(0u64).build().is_err());
    }

    #[test]
    fn test_deserialized_config_is_validated_like_builder() {
        let config: ExplorerConfig = serde_json::from_str(r#"{"channel_size":0}"#).unwrap();
        let from_builder = ExplorerConfig::builder()
            .channel_size(0usize)
            .build()
            .unwrap_err();
        let err = config.validate().unwrap_err();
        assert!(from_builder.to_string().contains(&err));
        assert!(ExplorerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config: ExplorerConfig = serde_json::from_str(r#"{"failure_policy":"revert"}"#).unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Revert);
        assert_eq!(config.content_debounce_ms, 400);
        assert_eq!(config.app_title, "Note App");
    }

    #[test]
    fn test_failure_policy_parse() {
        assert_eq!("keep-local".parse::<FailurePolicy>().unwrap(), FailurePolicy::KeepLocal);
        assert_eq!(FailurePolicy::Revert.to_string(), "revert");
    }
}
