//! Error types for tree mutations.

use thiserror::Error;

use crate::node::NodeKey;

/// Structural violations rejected at the store boundary.
///
/// Every operation returning one of these leaves the tree untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// No node with this key exists.
    #[error("Node not found: {key}")]
    NotFound { key: NodeKey },

    /// A node with this key already exists.
    #[error("Duplicate node key: {key}")]
    DuplicateKey { key: NodeKey },

    /// The target of the operation must be a directory.
    #[error("Not a directory: {key}")]
    NotADirectory { key: NodeKey },

    /// A note was given children.
    #[error("Note cannot own children: {key}")]
    NoteHasChildren { key: NodeKey },

    /// Moving the node would make it its own ancestor.
    #[error("Cannot move {key} into its own subtree ({target})")]
    WouldCycle { key: NodeKey, target: NodeKey },

    /// The node already lives under the requested parent.
    #[error("{key} is already in {}", display_parent(.parent))]
    AlreadyInParent {
        key: NodeKey,
        parent: Option<NodeKey>,
    },
}

fn display_parent(parent: &Option<NodeKey>) -> String {
    match parent {
        Some(key) => key.to_string(),
        None => "the root".to_string(),
    }
}

impl TreeError {
    /// Create a not-found error.
    pub fn not_found(key: &NodeKey) -> Self {
        Self::NotFound { key: key.clone() }
    }

    /// Check if this error is a redundant no-op rather than a real violation.
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::AlreadyInParent { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_error_messages() {
        let err = TreeError::AlreadyInParent {
            key: NodeKey::new("n1"),
            parent: None,
        };
        assert_eq!(err.to_string(), "n1 is already in the root");
        assert!(err.is_noop());

        let err = TreeError::not_found(&NodeKey::new("x"));
        assert!(err.to_string().contains("not found"));
        assert!(!err.is_noop());
    }
}
