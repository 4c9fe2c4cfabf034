//! Persistence request types.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::Display;

use notetree_core::{NodeKey, NodeKind};

/// Identifier of a dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpId(pub u64);

impl std::fmt::Display for OpId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The type of request being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum RequestType {
    Create,
    Rename,
    Delete,
    #[strum(to_string = "Move note")]
    MoveNote,
    #[strum(to_string = "Move directory")]
    MoveDirectory,
    #[strum(to_string = "Update content")]
    UpdateContent,
}

/// A request sent to the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PersistRequest {
    /// Create a node; the server assigns its key.
    Create {
        kind: NodeKind,
        parent: Option<NodeKey>,
    },
    /// Rename a node.
    Rename { key: NodeKey, name: CompactString },
    /// Delete a node and its subtree.
    Delete { key: NodeKey },
    /// Reparent a note.
    MoveNote {
        note: NodeKey,
        directory: Option<NodeKey>,
    },
    /// Reparent a directory.
    MoveDirectory {
        directory: NodeKey,
        parent: Option<NodeKey>,
    },
    /// Replace a note's content.
    UpdateContent { note: NodeKey, content: String },
}

impl PersistRequest {
    /// Create a node creation request.
    pub fn create(kind: NodeKind, parent: Option<NodeKey>) -> Self {
        Self::Create { kind, parent }
    }

    /// Create a rename request.
    pub fn rename(key: NodeKey, name: impl Into<CompactString>) -> Self {
        Self::Rename {
            key,
            name: name.into(),
        }
    }

    /// Create a delete request.
    pub fn delete(key: NodeKey) -> Self {
        Self::Delete { key }
    }

    /// Create the move request matching a node's kind.
    ///
    /// Notes and directories use different endpoints.
    pub fn move_to(kind: NodeKind, key: NodeKey, parent: Option<NodeKey>) -> Self {
        match kind {
            NodeKind::Note => Self::MoveNote {
                note: key,
                directory: parent,
            },
            NodeKind::Directory => Self::MoveDirectory {
                directory: key,
                parent,
            },
        }
    }

    /// Create a content update request.
    pub fn update_content(note: NodeKey, content: impl Into<String>) -> Self {
        Self::UpdateContent {
            note,
            content: content.into(),
        }
    }

    /// The type of this request.
    pub fn request_type(&self) -> RequestType {
        match self {
            Self::Create { .. } => RequestType::Create,
            Self::Rename { .. } => RequestType::Rename,
            Self::Delete { .. } => RequestType::Delete,
            Self::MoveNote { .. } => RequestType::MoveNote,
            Self::MoveDirectory { .. } => RequestType::MoveDirectory,
            Self::UpdateContent { .. } => RequestType::UpdateContent,
        }
    }

    /// The existing node this request acts on, if any.
    pub fn target(&self) -> Option<&NodeKey> {
        match self {
            Self::Create { .. } => None,
            Self::Rename { key, .. } | Self::Delete { key } => Some(key),
            Self::MoveNote { note, .. } | Self::UpdateContent { note, .. } => Some(note),
            Self::MoveDirectory { directory, .. } => Some(directory),
        }
    }
}
