//! Data carried by an active drag gesture.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use notetree_core::{Node, NodeKey, NodeKind};

/// What is being dragged, captured when the gesture starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum DragPayload {
    Note {
        key: NodeKey,
        parent_key: Option<NodeKey>,
        name: CompactString,
    },
    Directory {
        key: NodeKey,
        parent_key: Option<NodeKey>,
        name: CompactString,
    },
}

impl DragPayload {
    /// Snapshot a node as a payload.
    pub fn from_node(node: &Node) -> Self {
        let key = node.key().clone();
        let parent_key = node.parent_key().cloned();
        let name = CompactString::from(node.name());
        match node.kind() {
            NodeKind::Note => Self::Note {
                key,
                parent_key,
                name,
            },
            NodeKind::Directory => Self::Directory {
                key,
                parent_key,
                name,
            },
        }
    }

    pub fn key(&self) -> &NodeKey {
        match self {
            Self::Note { key, .. } | Self::Directory { key, .. } => key,
        }
    }

    /// Parent at the time the gesture started.
    pub fn parent_key(&self) -> Option<&NodeKey> {
        match self {
            Self::Note { parent_key, .. } | Self::Directory { parent_key, .. } => {
                parent_key.as_ref()
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Note { name, .. } | Self::Directory { name, .. } => name.as_str(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Note { .. } => NodeKind::Note,
            Self::Directory { .. } => NodeKind::Directory,
        }
    }
}
