//! Key-indexed arena holding the note tree.

use compact_str::CompactString;
use indexmap::IndexMap;

use crate::error::TreeError;
use crate::node::{Node, NodeKey, TreeNode};

/// Where a node sat before it was moved or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Parent directory, `None` for the root sequence.
    pub parent: Option<NodeKey>,
    /// Index among the parent's children.
    pub index: usize,
}

/// A subtree detached from the tree by [`NoteTree::remove`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detached {
    /// The removed node with its descendants nested inside.
    pub node: TreeNode,
    /// Where it used to be.
    pub location: Location,
}

impl Detached {
    /// Iterate over every key in the detached subtree.
    pub fn keys(&self) -> impl Iterator<Item = &NodeKey> {
        let mut stack = vec![&self.node];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter());
            Some(&node.key)
        })
    }
}

/// Arena of notes and directories with an ordered root sequence.
///
/// Nodes are indexed by key; parent and children are stored as key
/// references. All traversals use explicit stacks, so depth is unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteTree {
    nodes: IndexMap<NodeKey, Node>,
    roots: Vec<NodeKey>,
}

impl NoteTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from nested root nodes.
    ///
    /// Fails on duplicate keys and on notes that carry children. A declared
    /// parent key that disagrees with the nesting is replaced by the
    /// structural parent.
    pub fn from_nodes(roots: Vec<TreeNode>) -> Result<Self, TreeError> {
        let mut tree = Self::new();
        for root in roots {
            tree.attach(root, None, None)?;
        }
        Ok(tree)
    }

    /// Export the tree in its nested wire shape.
    pub fn to_nodes(&self) -> Vec<TreeNode> {
        self.roots
            .iter()
            .filter_map(|key| self.subtree(key))
            .collect()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check if a key exists.
    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Look up a node by key.
    pub fn get(&self, key: &NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Look up a node, failing with [`TreeError::NotFound`].
    pub fn require(&self, key: &NodeKey) -> Result<&Node, TreeError> {
        self.nodes.get(key).ok_or_else(|| TreeError::not_found(key))
    }

    /// Ordered root-level keys.
    pub fn root_keys(&self) -> &[NodeKey] {
        &self.roots
    }

    /// Ordered root-level nodes.
    pub fn roots(&self) -> impl Iterator<Item = &Node> {
        self.roots.iter().filter_map(|key| self.nodes.get(key))
    }

    /// Ordered children of a directory, or the roots for `None`.
    pub fn children(&self, parent: Option<&NodeKey>) -> impl Iterator<Item = &Node> {
        let keys: &[NodeKey] = match parent {
            None => &self.roots,
            Some(key) => self.nodes.get(key).map_or(&[][..], |n| &n.children[..]),
        };
        keys.iter().filter_map(|key| self.nodes.get(key))
    }

    /// All nodes, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Walk from a node's parent up to its root-level ancestor.
    pub fn ancestors(&self, key: &NodeKey) -> impl Iterator<Item = &Node> {
        let mut current = self.nodes.get(key).and_then(|n| n.parent.as_ref());
        std::iter::from_fn(move || {
            let node = self.nodes.get(current?)?;
            current = node.parent.as_ref();
            Some(node)
        })
    }

    /// Number of ancestors; root-level nodes have depth 0.
    pub fn depth(&self, key: &NodeKey) -> usize {
        self.ancestors(key).count()
    }

    /// Check if `key` lies strictly inside the subtree of `ancestor`.
    pub fn is_descendant(&self, key: &NodeKey, ancestor: &NodeKey) -> bool {
        self.ancestors(key).any(|node| node.key == *ancestor)
    }

    /// Keys of a node and all of its descendants, pre-order.
    pub fn subtree_keys(&self, key: &NodeKey) -> Vec<NodeKey> {
        let mut keys = Vec::new();
        if !self.contains(key) {
            return keys;
        }
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            keys.push(current.clone());
            if let Some(node) = self.nodes.get(current) {
                stack.extend(node.children.iter().rev());
            }
        }
        keys
    }

    /// Current location of a node.
    pub fn location(&self, key: &NodeKey) -> Result<Location, TreeError> {
        let node = self.require(key)?;
        let siblings = self.sibling_keys(node.parent.as_ref());
        let index = siblings
            .iter()
            .position(|k| k == key)
            .ok_or_else(|| TreeError::not_found(key))?;
        Ok(Location {
            parent: node.parent.clone(),
            index,
        })
    }

    /// Check whether moving `key` under `new_parent` is legal.
    pub fn check_move(&self, key: &NodeKey, new_parent: Option<&NodeKey>) -> Result<(), TreeError> {
        let node = self.require(key)?;
        if node.parent.as_ref() == new_parent {
            return Err(TreeError::AlreadyInParent {
                key: key.clone(),
                parent: new_parent.cloned(),
            });
        }
        if let Some(target) = new_parent {
            if target == key || self.is_descendant(target, key) {
                return Err(TreeError::WouldCycle {
                    key: key.clone(),
                    target: target.clone(),
                });
            }
            if !self.require(target)?.is_directory() {
                return Err(TreeError::NotADirectory {
                    key: target.clone(),
                });
            }
        }
        Ok(())
    }

    /// Relocate a node and its subtree to the end of `new_parent`'s children.
    ///
    /// Returns the node's previous location.
    pub fn relocate(
        &mut self,
        key: &NodeKey,
        new_parent: Option<&NodeKey>,
    ) -> Result<Location, TreeError> {
        self.check_move(key, new_parent)?;
        let index = self.sibling_keys(new_parent).len();
        self.relocate_to(key, new_parent, index)
    }

    /// Relocate a node to a specific index under `new_parent`.
    ///
    /// Unlike [`relocate`](Self::relocate) this accepts the current parent,
    /// which makes it usable for restoring a previous [`Location`].
    pub fn relocate_to(
        &mut self,
        key: &NodeKey,
        new_parent: Option<&NodeKey>,
        index: usize,
    ) -> Result<Location, TreeError> {
        match self.check_move(key, new_parent) {
            Ok(()) | Err(TreeError::AlreadyInParent { .. }) => {}
            Err(err) => return Err(err),
        }
        let previous = self.location(key)?;
        self.sibling_keys_mut(previous.parent.as_ref())
            .remove(previous.index);

        let siblings = self.sibling_keys_mut(new_parent);
        let index = index.min(siblings.len());
        siblings.insert(index, key.clone());

        if let Some(node) = self.nodes.get_mut(key) {
            node.parent = new_parent.cloned();
        }
        Ok(previous)
    }

    /// Insert a nested node at the end of its declared parent.
    pub fn insert(&mut self, node: TreeNode) -> Result<(), TreeError> {
        let index = self.sibling_keys_checked(node.parent_key.as_ref())?.len();
        self.insert_at(node, index)
    }

    /// Insert a nested node at `index` under its declared parent.
    pub fn insert_at(&mut self, node: TreeNode, index: usize) -> Result<(), TreeError> {
        let parent = node.parent_key.clone();
        self.sibling_keys_checked(parent.as_ref())?;
        self.validate_new(&node)?;
        self.attach(node, parent, Some(index))
    }

    /// Remove a node and its subtree.
    pub fn remove(&mut self, key: &NodeKey) -> Result<Detached, TreeError> {
        let location = self.location(key)?;
        let node = self.subtree(key).ok_or_else(|| TreeError::not_found(key))?;

        self.sibling_keys_mut(location.parent.as_ref())
            .remove(location.index);
        // Arena order is not observable; sibling order lives in `roots` and `children`.
        for k in self.subtree_keys(key) {
            self.nodes.swap_remove(&k);
        }
        Ok(Detached { node, location })
    }

    /// Change a node's label, returning the old one.
    pub fn rename(
        &mut self,
        key: &NodeKey,
        name: impl Into<CompactString>,
    ) -> Result<CompactString, TreeError> {
        let node = self
            .nodes
            .get_mut(key)
            .ok_or_else(|| TreeError::not_found(key))?;
        Ok(std::mem::replace(&mut node.name, name.into()))
    }

    /// Rebuild the nested shape of one subtree.
    pub fn subtree(&self, key: &NodeKey) -> Option<TreeNode> {
        let node = self.nodes.get(key)?;
        let mut root = to_wire(node);

        // (wire node path, arena children still to expand)
        let mut stack: Vec<(Vec<usize>, &[NodeKey])> = vec![(Vec::new(), node.children.as_slice())];
        while let Some((path, child_keys)) = stack.pop() {
            for child_key in child_keys {
                let Some(child) = self.nodes.get(child_key) else {
                    continue;
                };
                let parent = wire_at(&mut root, &path);
                parent.children.push(to_wire(child));
                let mut child_path = path.clone();
                child_path.push(parent.children.len() - 1);
                stack.push((child_path, child.children.as_slice()));
            }
        }
        Some(root)
    }

    fn validate_new(&self, node: &TreeNode) -> Result<(), TreeError> {
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if self.contains(&current.key) || !seen.insert(&current.key) {
                return Err(TreeError::DuplicateKey {
                    key: current.key.clone(),
                });
            }
            if current.is_note() && !current.children.is_empty() {
                return Err(TreeError::NoteHasChildren {
                    key: current.key.clone(),
                });
            }
            stack.extend(current.children.iter());
        }
        Ok(())
    }

    /// Move a nested node into the arena under `parent`.
    ///
    /// `index` of `None` appends. Callers validate keys up front or discard
    /// the tree on error, so a failure midway leaves a partial subtree.
    fn attach(
        &mut self,
        node: TreeNode,
        parent: Option<NodeKey>,
        index: Option<usize>,
    ) -> Result<(), TreeError> {
        let mut stack = vec![(node, parent, index)];
        while let Some((node, parent, index)) = stack.pop() {
            let TreeNode {
                key,
                name,
                kind,
                parent_key,
                children,
            } = node;

            if self.nodes.contains_key(&key) {
                return Err(TreeError::DuplicateKey { key });
            }
            if kind.is_note() && !children.is_empty() {
                return Err(TreeError::NoteHasChildren { key });
            }
            if parent_key != parent {
                tracing::warn!(
                    target: "store",
                    key = %key,
                    declared = ?parent_key,
                    actual = ?parent,
                    "parent key disagrees with nesting, using structural parent"
                );
            }

            let siblings = self.sibling_keys_mut(parent.as_ref());
            match index {
                Some(ix) => siblings.insert(ix.min(siblings.len()), key.clone()),
                None => siblings.push(key.clone()),
            }
            self.nodes
                .insert(key.clone(), Node::new(key.clone(), name, kind, parent));

            // Reverse so that children pop in their original order.
            for child in children.into_iter().rev() {
                stack.push((child, Some(key.clone()), None));
            }
        }
        Ok(())
    }

    fn sibling_keys(&self, parent: Option<&NodeKey>) -> &[NodeKey] {
        match parent {
            None => &self.roots,
            Some(key) => self.nodes.get(key).map_or(&[][..], |n| &n.children[..]),
        }
    }

    fn sibling_keys_checked(&self, parent: Option<&NodeKey>) -> Result<&[NodeKey], TreeError> {
        match parent {
            None => Ok(&self.roots),
            Some(key) => {
                let node = self.require(key)?;
                if !node.is_directory() {
                    return Err(TreeError::NotADirectory { key: key.clone() });
                }
                Ok(&node.children)
            }
        }
    }

    fn sibling_keys_mut(&mut self, parent: Option<&NodeKey>) -> &mut Vec<NodeKey> {
        match parent.and_then(|key| self.nodes.get_mut(key)) {
            Some(node) => &mut node.children,
            None => &mut self.roots,
        }
    }
}

fn to_wire(node: &Node) -> TreeNode {
    TreeNode {
        key: node.key.clone(),
        name: node.name.clone(),
        kind: node.kind,
        parent_key: node.parent.clone(),
        children: Vec::new(),
    }
}

fn wire_at<'a>(root: &'a mut TreeNode, path: &[usize]) -> &'a mut TreeNode {
    path.iter().fold(root, |node, &ix| &mut node.children[ix])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(k: &str) -> NodeKey {
        NodeKey::new(k)
    }

    fn sample() -> NoteTree {
        // d1/
        //   n1
        //   d2/
        //     n2
        // n3
        NoteTree::from_nodes(vec![
            TreeNode::directory("d1", "A", None)
                .with_child(TreeNode::note("n1", "x", None))
                .with_child(
                    TreeNode::directory("d2", "B", None).with_child(TreeNode::note("n2", "y", None)),
                ),
            TreeNode::note("n3", "z", None),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_nodes_indexes_everything() {
        let tree = sample();
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.root_keys(), &[key("d1"), key("n3")]);
        assert_eq!(tree.get(&key("n2")).unwrap().parent_key(), Some(&key("d2")));
        assert_eq!(tree.depth(&key("n2")), 2);
        assert_eq!(tree.depth(&key("n3")), 0);
    }

    #[test]
    fn test_from_nodes_rejects_duplicates() {
        let err = NoteTree::from_nodes(vec![
            TreeNode::note("n1", "a", None),
            TreeNode::directory("d1", "b", None).with_child(TreeNode::note("n1", "c", None)),
        ])
        .unwrap_err();
        assert_eq!(err, TreeError::DuplicateKey { key: key("n1") });
    }

    #[test]
    fn test_from_nodes_rejects_note_children() {
        let mut note = TreeNode::note("n1", "a", None);
        note.children.push(TreeNode::note("n2", "b", Some(key("n1"))));
        let err = NoteTree::from_nodes(vec![note]).unwrap_err();
        assert_eq!(err, TreeError::NoteHasChildren { key: key("n1") });
    }

    #[test]
    fn test_from_nodes_normalizes_parent() {
        let mut dir = TreeNode::directory("d1", "A", None);
        dir.children.push(TreeNode::note("n1", "x", Some(key("bogus"))));
        let tree = NoteTree::from_nodes(vec![dir]).unwrap();
        assert_eq!(tree.get(&key("n1")).unwrap().parent_key(), Some(&key("d1")));
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let tree = sample();
        let nodes = tree.to_nodes();
        assert_eq!(NoteTree::from_nodes(nodes).unwrap(), tree);
    }

    #[test]
    fn test_subtree_keys_preorder() {
        let tree = sample();
        assert_eq!(
            tree.subtree_keys(&key("d1")),
            vec![key("d1"), key("n1"), key("d2"), key("n2")]
        );
        assert!(tree.subtree_keys(&key("missing")).is_empty());
    }

    #[test]
    fn test_is_descendant() {
        let tree = sample();
        assert!(tree.is_descendant(&key("n2"), &key("d1")));
        assert!(!tree.is_descendant(&key("d1"), &key("d1")));
        assert!(!tree.is_descendant(&key("n3"), &key("d1")));
    }

    #[test]
    fn test_relocate_appends() {
        let mut tree = sample();
        let from = tree.relocate(&key("n3"), Some(&key("d2"))).unwrap();
        assert_eq!(from, Location { parent: None, index: 1 });
        assert_eq!(tree.get(&key("d2")).unwrap().child_keys(), &[key("n2"), key("n3")]);
        assert_eq!(tree.root_keys(), &[key("d1")]);
    }

    #[test]
    fn test_relocate_rejections() {
        let mut tree = sample();
        let before = tree.clone();

        assert!(matches!(
            tree.relocate(&key("d1"), Some(&key("d2"))),
            Err(TreeError::WouldCycle { .. })
        ));
        assert!(matches!(
            tree.relocate(&key("d1"), Some(&key("d1"))),
            Err(TreeError::WouldCycle { .. })
        ));
        assert!(matches!(
            tree.relocate(&key("n1"), Some(&key("d1"))),
            Err(TreeError::AlreadyInParent { .. })
        ));
        assert!(matches!(
            tree.relocate(&key("d2"), Some(&key("n3"))),
            Err(TreeError::NotADirectory { .. })
        ));
        assert!(matches!(
            tree.relocate(&key("nope"), None),
            Err(TreeError::NotFound { .. })
        ));
        assert_eq!(tree, before);
    }

    #[test]
    fn test_relocate_to_restores_location() {
        let mut tree = sample();
        let before = tree.clone();
        let from = tree.relocate(&key("n1"), None).unwrap();
        tree.relocate_to(&key("n1"), from.parent.as_ref(), from.index)
            .unwrap();
        assert_eq!(tree, before);
    }

    #[test]
    fn test_remove_and_reinsert() {
        let mut tree = sample();
        let before = tree.clone();
        let detached = tree.remove(&key("d2")).unwrap();
        assert_eq!(tree.len(), 3);
        assert!(!tree.contains(&key("n2")));
        assert_eq!(detached.keys().count(), 2);
        assert_eq!(detached.location.index, 1);

        tree.insert_at(detached.node, detached.location.index).unwrap();
        assert_eq!(tree, before);
    }

    #[test]
    fn test_remove_wide_subtree_keeps_others_reachable() {
        let mut tree = sample();
        let mut wide = TreeNode::directory("wide", "W", None);
        for i in 0..2_000 {
            wide = wide.with_child(TreeNode::note(format!("w{i}"), "w", None));
        }
        tree.insert(wide).unwrap();
        tree.insert(TreeNode::note("tail", "t", None)).unwrap();
        let reference = sample();
        let before = reference.len() + 1;

        let detached = tree.remove(&key("wide")).unwrap();
        assert_eq!(detached.keys().count(), 2_001);
        assert_eq!(tree.len(), before);
        for node in reference.iter() {
            let kept = tree.get(node.key()).unwrap();
            assert_eq!(kept.parent_key(), node.parent_key());
            assert_eq!(kept.child_keys(), node.child_keys());
        }
        assert_eq!(tree.root_keys().last(), Some(&key("tail")));
    }

    #[test]
    fn test_insert_validates_parent() {
        let mut tree = sample();
        assert!(matches!(
            tree.insert(TreeNode::note("n9", "q", Some(key("n3")))),
            Err(TreeError::NotADirectory { .. })
        ));
        assert!(matches!(
            tree.insert(TreeNode::note("n9", "q", Some(key("gone")))),
            Err(TreeError::NotFound { .. })
        ));
        assert!(matches!(
            tree.insert(TreeNode::note("n1", "dup", None)),
            Err(TreeError::DuplicateKey { .. })
        ));
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_rename_returns_old() {
        let mut tree = sample();
        let old = tree.rename(&key("n1"), "renamed").unwrap();
        assert_eq!(old, "x");
        assert_eq!(tree.get(&key("n1")).unwrap().name(), "renamed");
    }

    #[test]
    fn test_deep_tree_does_not_recurse() {
        let depth = 10_000;
        let mut tree = NoteTree::new();
        tree.insert(TreeNode::directory("d0", "d0", None)).unwrap();
        for i in 1..depth {
            let parent = key(&format!("d{}", i - 1));
            tree.insert(TreeNode::directory(format!("d{i}"), "d", Some(parent)))
                .unwrap();
        }
        let deepest = key(&format!("d{}", depth - 1));
        assert_eq!(tree.depth(&deepest), depth - 1);
        assert!(tree.is_descendant(&deepest, &key("d0")));
        assert_eq!(tree.to_nodes()[0].subtree_len(), depth);
    }
}
