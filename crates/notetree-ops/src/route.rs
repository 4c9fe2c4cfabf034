//! Navigation state and derived values: links, titles, creation targets.

use notetree_core::{Node, NodeKey};

use crate::lifecycle::LifecycleError;

const TITLE_SEPARATOR: &str = "•";

/// What the main pane is showing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Route {
    /// Application root.
    #[default]
    Home,
    /// A note is open in the editor.
    Note(NodeKey),
}

impl Route {
    /// The open note, if any.
    pub fn note_key(&self) -> Option<&NodeKey> {
        match self {
            Self::Home => None,
            Self::Note(key) => Some(key),
        }
    }

    /// Parse the path segment after the notes prefix.
    ///
    /// An empty segment is the home route.
    pub fn from_segment(segment: &str) -> Self {
        let segment = segment.trim_matches('/');
        if segment.is_empty() {
            Self::Home
        } else {
            Self::Note(NodeKey::new(segment))
        }
    }
}

/// Build a shareable link to a note from the current location.
pub fn copy_link(location: &str, node: &Node) -> Result<String, LifecycleError> {
    if !node.is_note() {
        return Err(LifecycleError::NotANote {
            key: node.key().clone(),
        });
    }
    let separator = if location.ends_with('/') { "" } else { "/" };
    Ok(format!("{location}{separator}{}", node.key()))
}

/// Join the non-empty title parts and append the application suffix.
pub fn page_title<'a>(parts: impl IntoIterator<Item = Option<&'a str>>, suffix: &str) -> String {
    let mut segments: Vec<&str> = parts
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect();
    segments.push(suffix);
    segments.join(&format!(" {TITLE_SEPARATOR} "))
}

/// Parent for a node created from another node's menu.
///
/// Creating "inside" a note targets the note's own directory.
pub fn creation_parent(anchor: &Node) -> Option<NodeKey> {
    if anchor.is_directory() {
        Some(anchor.key().clone())
    } else {
        anchor.parent_key().cloned()
    }
}
