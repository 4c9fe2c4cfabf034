//! Note and directory node types.

use std::fmt;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Globally unique, opaque identifier for a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(CompactString);

impl NodeKey {
    /// Create a new key from any string-like value.
    pub fn new(key: impl Into<CompactString>) -> Self {
        Self(key.into())
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for NodeKey {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl AsRef<str> for NodeKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Type of tree node. Fixed for the lifetime of the node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NodeKind {
    /// A leaf holding textual content.
    Note,
    /// A container of notes and other directories.
    Directory,
}

impl NodeKind {
    /// Check if this is a note.
    pub fn is_note(self) -> bool {
        matches!(self, NodeKind::Note)
    }

    /// Check if this is a directory.
    pub fn is_directory(self) -> bool {
        matches!(self, NodeKind::Directory)
    }
}

/// A nested node as exchanged with the remote store.
///
/// This is the wire shape: a directory owns its children inline. Inside the
/// store nodes live in an arena instead (see [`crate::NoteTree`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Unique key.
    pub key: NodeKey,

    /// User-visible label.
    pub name: CompactString,

    /// Note or directory.
    #[serde(rename = "type")]
    pub kind: NodeKind,

    /// Owning directory, `None` for root-level nodes.
    #[serde(default)]
    pub parent_key: Option<NodeKey>,

    /// Ordered children (directories only).
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Create a new note.
    pub fn note(
        key: impl Into<NodeKey>,
        name: impl Into<CompactString>,
        parent_key: Option<NodeKey>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            kind: NodeKind::Note,
            parent_key,
            children: Vec::new(),
        }
    }

    /// Create a new, empty directory.
    pub fn directory(
        key: impl Into<NodeKey>,
        name: impl Into<CompactString>,
        parent_key: Option<NodeKey>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            kind: NodeKind::Directory,
            parent_key,
            children: Vec::new(),
        }
    }

    /// Append a child, fixing up its parent key. Builder-style.
    pub fn with_child(mut self, mut child: TreeNode) -> Self {
        child.parent_key = Some(self.key.clone());
        self.children.push(child);
        self
    }

    /// Check if this node is a note.
    pub fn is_note(&self) -> bool {
        self.kind.is_note()
    }

    /// Check if this node is a directory.
    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    /// Count this node and all of its descendants.
    pub fn subtree_len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

/// A node stored in the arena.
///
/// Parent and children are key references, never nested ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub(crate) key: NodeKey,
    pub(crate) name: CompactString,
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,
}

impl Node {
    pub(crate) fn new(
        key: NodeKey,
        name: CompactString,
        kind: NodeKind,
        parent: Option<NodeKey>,
    ) -> Self {
        Self {
            key,
            name,
            kind,
            parent,
            children: Vec::new(),
        }
    }

    /// Unique key of this node.
    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    /// Current label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Note or directory.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Owning directory, `None` at root level.
    pub fn parent_key(&self) -> Option<&NodeKey> {
        self.parent.as_ref()
    }

    /// Ordered child keys.
    pub fn child_keys(&self) -> &[NodeKey] {
        &self.children
    }

    /// Check if this node is a note.
    pub fn is_note(&self) -> bool {
        self.kind.is_note()
    }

    /// Check if this node is a directory.
    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    /// Get the number of direct children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_key() {
        let key = NodeKey::new("n1");
        assert_eq!(key.as_str(), "n1");
        assert_eq!(key.to_string(), "n1");
        assert_eq!(key, NodeKey::from("n1"));
    }

    #[test]
    fn test_node_kind_strings() {
        assert_eq!(NodeKind::Note.to_string(), "note");
        assert_eq!("directory".parse::<NodeKind>().unwrap(), NodeKind::Directory);
        assert!("folder".parse::<NodeKind>().is_err());
    }

    #[test]
    fn test_with_child_sets_parent() {
        let dir = TreeNode::directory("d1", "A", None).with_child(TreeNode::note("n1", "x", None));
        assert_eq!(dir.children[0].parent_key, Some(NodeKey::new("d1")));
        assert_eq!(dir.subtree_len(), 2);
    }

    #[test]
    fn test_tree_node_wire_shape() {
        let json = r#"{"key":"n1","name":"x","type":"note","parentKey":null}"#;
        let node: TreeNode = serde_json::from_str(json).unwrap();
        assert!(node.is_note());
        assert!(node.children.is_empty());
        assert!(node.parent_key.is_none());

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["type"], "note");
        assert!(back["parentKey"].is_null());
    }
}
