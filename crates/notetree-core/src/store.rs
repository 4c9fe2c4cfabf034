//! The tree state store: snapshot, expansion and selection.

use std::collections::HashSet;

use compact_str::CompactString;

use crate::error::TreeError;
use crate::node::{Node, NodeKey, TreeNode};
use crate::tree::{Detached, Location, NoteTree};

/// Progress of the remote tree fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Nothing loaded yet.
    #[default]
    Loading,
    /// A snapshot is available.
    Ready,
    /// The fetch failed; no tree is shown.
    Failed(String),
}

/// Single owner of the explorer's tree state.
///
/// All mutation goes through these methods so the tree invariants hold in
/// one place. Rejected operations return an error and change nothing.
#[derive(Debug, Default)]
pub struct TreeStore {
    tree: NoteTree,
    expanded: HashSet<NodeKey>,
    selected: Option<NodeKey>,
    load_state: LoadState,
}

impl TreeStore {
    /// Create an empty store in the loading state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot.
    pub fn tree(&self) -> &NoteTree {
        &self.tree
    }

    /// Look up a node by key.
    pub fn node(&self, key: &NodeKey) -> Option<&Node> {
        self.tree.get(key)
    }

    /// Progress of the initial fetch.
    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    /// Replace the snapshot.
    ///
    /// Expansion and selection are kept by key, so directories stay open
    /// across refetches. A malformed snapshot leaves the previous one in place.
    pub fn load(&mut self, nodes: Vec<TreeNode>) -> Result<(), TreeError> {
        let tree = NoteTree::from_nodes(nodes)?;
        tracing::debug!(target: "store", nodes = tree.len(), "tree loaded");
        self.tree = tree;
        self.load_state = LoadState::Ready;
        Ok(())
    }

    /// Record a failed fetch. No partial tree is kept.
    pub fn fail_load(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(target: "store", %message, "tree load failed");
        self.tree = NoteTree::new();
        self.load_state = LoadState::Failed(message);
    }

    /// Set the selected key. The key is not validated.
    pub fn select(&mut self, key: Option<NodeKey>) {
        self.selected = key;
    }

    /// Clear the selection.
    pub fn deselect(&mut self) {
        self.selected = None;
    }

    /// The selected key, if it still exists in the tree.
    pub fn selected(&self) -> Option<&NodeKey> {
        self.selected.as_ref().filter(|key| self.tree.contains(key))
    }

    /// Check if a node is the current selection.
    pub fn is_selected(&self, key: &NodeKey) -> bool {
        self.selected() == Some(key)
    }

    /// Check if a directory is shown open.
    pub fn is_expanded(&self, key: &NodeKey) -> bool {
        self.expanded.contains(key)
    }

    /// Keys currently marked open, including orphans not yet pruned.
    pub fn expanded_keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.expanded.iter()
    }

    /// Flip a directory open or closed.
    ///
    /// Notes and unknown keys are left alone. Returns the resulting state.
    pub fn toggle_expansion(&mut self, key: &NodeKey) -> bool {
        if !self.tree.get(key).is_some_and(Node::is_directory) {
            return false;
        }
        if !self.expanded.remove(key) {
            self.expanded.insert(key.clone());
        }
        self.is_expanded(key)
    }

    /// Open or close a directory explicitly.
    pub fn set_expanded(&mut self, key: &NodeKey, expanded: bool) {
        if !expanded {
            self.expanded.remove(key);
        } else if self.tree.get(key).is_some_and(Node::is_directory) {
            self.expanded.insert(key.clone());
        }
    }

    /// Drop expanded keys whose directories no longer exist.
    pub fn prune_expanded(&mut self) -> usize {
        let before = self.expanded.len();
        let tree = &self.tree;
        self.expanded.retain(|key| tree.contains(key));
        before - self.expanded.len()
    }

    /// Move a node and its subtree to the end of `new_parent`'s children.
    ///
    /// Rejected when the node is already there, when the target is the node
    /// itself or one of its descendants, or when the target is not a
    /// directory. Returns where the node used to be.
    pub fn move_node(
        &mut self,
        key: &NodeKey,
        new_parent: Option<&NodeKey>,
    ) -> Result<Location, TreeError> {
        match self.tree.relocate(key, new_parent) {
            Ok(previous) => {
                tracing::debug!(target: "store", %key, to = ?new_parent, "node moved");
                Ok(previous)
            }
            Err(err) => {
                tracing::debug!(target: "store", %key, error = %err, "move rejected");
                Err(err)
            }
        }
    }

    /// Put a node back at an exact location. Used to undo a move.
    pub fn restore_location(&mut self, key: &NodeKey, location: &Location) -> Result<(), TreeError> {
        self.tree
            .relocate_to(key, location.parent.as_ref(), location.index)
            .map(|_| ())
    }

    /// Add a node (and any nested children) under its parent.
    pub fn insert(&mut self, node: TreeNode) -> Result<(), TreeError> {
        self.tree.insert(node)
    }

    /// Add a node at a given index under its parent.
    pub fn insert_at(&mut self, node: TreeNode, index: usize) -> Result<(), TreeError> {
        self.tree.insert_at(node, index)
    }

    /// Remove a node and its subtree.
    ///
    /// Clears the selection if it pointed anywhere inside the subtree.
    pub fn remove(&mut self, key: &NodeKey) -> Result<Detached, TreeError> {
        let detached = self.tree.remove(key)?;
        if let Some(selected) = &self.selected {
            if detached.keys().any(|k| k == selected) {
                self.selected = None;
            }
        }
        tracing::debug!(target: "store", %key, removed = detached.node.subtree_len(), "node removed");
        Ok(detached)
    }

    /// Change a node's label. Names are not validated; only keys are unique.
    pub fn rename(
        &mut self,
        key: &NodeKey,
        name: impl Into<CompactString>,
    ) -> Result<CompactString, TreeError> {
        self.tree.rename(key, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(k: &str) -> NodeKey {
        NodeKey::new(k)
    }

    fn loaded() -> TreeStore {
        let mut store = TreeStore::new();
        store
            .load(vec![
                TreeNode::directory("d1", "A", None).with_child(TreeNode::note("n1", "x", None)),
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_new_store_is_loading() {
        let store = TreeStore::new();
        assert_eq!(store.load_state(), &LoadState::Loading);
        assert!(store.tree().is_empty());
    }

    #[test]
    fn test_toggle_expansion() {
        let mut store = loaded();
        assert!(store.toggle_expansion(&key("d1")));
        assert!(store.is_expanded(&key("d1")));
        assert!(!store.toggle_expansion(&key("d1")));
        assert!(!store.is_expanded(&key("d1")));
    }

    #[test]
    fn test_toggle_note_is_noop() {
        let mut store = loaded();
        assert!(!store.toggle_expansion(&key("n1")));
        assert!(!store.is_expanded(&key("n1")));
        assert!(!store.toggle_expansion(&key("ghost")));
    }

    #[test]
    fn test_selection_self_heals() {
        let mut store = loaded();
        store.select(Some(key("ghost")));
        assert!(store.selected().is_none());
        assert!(!store.is_selected(&key("ghost")));

        store.select(Some(key("n1")));
        assert!(store.is_selected(&key("n1")));
        store.deselect();
        assert!(store.selected().is_none());
    }

    #[test]
    fn test_fail_load_clears_tree() {
        let mut store = loaded();
        store.fail_load("boom");
        assert!(store.tree().is_empty());
        assert_eq!(store.load_state(), &LoadState::Failed("boom".into()));
    }

    #[test]
    fn test_bad_load_keeps_previous_tree() {
        let mut store = loaded();
        let err = store
            .load(vec![TreeNode::note("a", "1", None), TreeNode::note("a", "2", None)])
            .unwrap_err();
        assert!(matches!(err, TreeError::DuplicateKey { .. }));
        assert!(store.node(&key("d1")).is_some());
    }

    #[test]
    fn test_prune_expanded() {
        let mut store = loaded();
        store.set_expanded(&key("d1"), true);
        store.remove(&key("d1")).unwrap();
        assert!(store.is_expanded(&key("d1")));
        assert_eq!(store.prune_expanded(), 1);
        assert!(!store.is_expanded(&key("d1")));
    }

    #[test]
    fn test_set_expanded_ignores_notes() {
        let mut store = loaded();
        store.set_expanded(&key("n1"), true);
        assert!(!store.is_expanded(&key("n1")));
    }
}
