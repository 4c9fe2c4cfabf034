//! Inline name editing for a tree row.

use compact_str::CompactString;

use notetree_core::{NodeKey, TreeError, TreeStore};

use crate::lifecycle::{Lifecycle, LifecycleError};
use crate::persistence::Persistence;
use crate::request::OpId;

/// A rename in progress.
///
/// The draft stays local until [`commit`](Self::commit); [`cancel`](Self::cancel)
/// discards it without touching the store.
#[derive(Debug, Clone)]
pub struct NameEditor {
    key: NodeKey,
    original: CompactString,
    draft: String,
}

impl NameEditor {
    /// Start editing the name of `key`, seeded with its current name.
    pub fn begin(store: &TreeStore, key: &NodeKey) -> Result<Self, TreeError> {
        let node = store.tree().require(key)?;
        Ok(Self {
            key: key.clone(),
            original: CompactString::from(node.name()),
            draft: node.name().to_string(),
        })
    }

    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Replace the draft with the field's current text.
    pub fn set(&mut self, value: impl Into<String>) {
        self.draft = value.into();
    }

    /// Check if the draft differs from the name editing started with.
    pub fn is_dirty(&self) -> bool {
        self.draft != self.original.as_str()
    }

    /// Finish editing (Enter or blur).
    ///
    /// Returns `None` without issuing a request when the name is unchanged.
    pub fn commit<P: Persistence>(
        self,
        lifecycle: &mut Lifecycle<P>,
        store: &mut TreeStore,
    ) -> Result<Option<OpId>, LifecycleError> {
        if !self.is_dirty() {
            return Ok(None);
        }
        lifecycle.rename(store, &self.key, self.draft).map(Some)
    }

    /// Abandon editing (Escape). Returns the name to display again.
    pub fn cancel(self) -> CompactString {
        self.original
    }
}
