//! In-process remote store.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use compact_str::CompactString;

use notetree_core::{NodeKey, NodeKind, NoteTree, TreeError, TreeNode};

use crate::persistence::{Persistence, RequestError};
use crate::request::PersistRequest;

#[derive(Debug, Default)]
struct RemoteState {
    tree: NoteTree,
    contents: HashMap<NodeKey, String>,
    next_key: u64,
    failures: VecDeque<RequestError>,
    calls: Vec<PersistRequest>,
}

/// A remote store that keeps everything in memory.
///
/// Behaves like the server: assigns keys, validates moves and deletes, and
/// can be told to fail upcoming requests.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    state: Mutex<RemoteState>,
}

impl MemoryRemote {
    /// Create an empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a remote holding the given tree.
    pub fn with_tree(nodes: Vec<TreeNode>) -> Result<Self, TreeError> {
        let tree = NoteTree::from_nodes(nodes)?;
        Ok(Self {
            state: Mutex::new(RemoteState {
                tree,
                ..Default::default()
            }),
        })
    }

    /// Make the next request fail with `error`. Queued failures apply in order.
    pub fn fail_next(&self, error: RequestError) {
        self.lock().failures.push_back(error);
    }

    /// Current server-side tree.
    pub fn snapshot(&self) -> Vec<TreeNode> {
        self.lock().tree.to_nodes()
    }

    /// Stored content of a note.
    pub fn content(&self, key: &NodeKey) -> Option<String> {
        self.lock().contents.get(key).cloned()
    }

    /// Every mutating request received so far, in arrival order.
    pub fn calls(&self) -> Vec<PersistRequest> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a call and pop any injected failure.
    fn begin(&self, request: Option<PersistRequest>) -> Result<MutexGuard<'_, RemoteState>, RequestError> {
        let mut state = self.lock();
        if let Some(request) = request {
            state.calls.push(request);
        }
        match state.failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }
}

fn reject(err: TreeError) -> RequestError {
    match err {
        TreeError::NotFound { key } => RequestError::NotFound { key },
        other => RequestError::rejected(other.to_string()),
    }
}

fn move_checked(
    state: &mut RemoteState,
    key: &NodeKey,
    expected: NodeKind,
    parent: Option<&NodeKey>,
) -> Result<(), RequestError> {
    let node = state.tree.require(key).map_err(reject)?;
    if node.kind() != expected {
        return Err(RequestError::rejected(format!("{key} is not a {expected}")));
    }
    match state.tree.relocate(key, parent) {
        Ok(_) | Err(TreeError::AlreadyInParent { .. }) => Ok(()),
        Err(err) => Err(reject(err)),
    }
}

impl Persistence for MemoryRemote {
    async fn fetch_tree(&self) -> Result<Vec<TreeNode>, RequestError> {
        let state = self.begin(None)?;
        Ok(state.tree.to_nodes())
    }

    async fn create_node(
        &self,
        kind: NodeKind,
        parent: Option<NodeKey>,
    ) -> Result<TreeNode, RequestError> {
        let mut state = self.begin(Some(PersistRequest::create(kind, parent.clone())))?;
        let key = loop {
            state.next_key += 1;
            let key = NodeKey::new(format!("{kind}-{}", state.next_key));
            if !state.tree.contains(&key) {
                break key;
            }
        };
        let node = match kind {
            NodeKind::Note => TreeNode::note(key.clone(), "Untitled", parent),
            NodeKind::Directory => TreeNode::directory(key.clone(), "New Directory", parent),
        };
        state.tree.insert(node.clone()).map_err(reject)?;
        if kind.is_note() {
            state.contents.insert(key, String::new());
        }
        Ok(node)
    }

    async fn rename_node(&self, key: NodeKey, name: CompactString) -> Result<(), RequestError> {
        let mut state = self.begin(Some(PersistRequest::rename(key.clone(), name.clone())))?;
        state.tree.rename(&key, name).map_err(reject)?;
        Ok(())
    }

    async fn delete_node(&self, key: NodeKey) -> Result<(), RequestError> {
        let mut state = self.begin(Some(PersistRequest::delete(key.clone())))?;
        let detached = state.tree.remove(&key).map_err(reject)?;
        for removed in detached.keys() {
            state.contents.remove(removed);
        }
        Ok(())
    }

    async fn move_note(&self, note: NodeKey, directory: Option<NodeKey>) -> Result<(), RequestError> {
        let request = PersistRequest::move_to(NodeKind::Note, note.clone(), directory.clone());
        let mut state = self.begin(Some(request))?;
        move_checked(&mut state, &note, NodeKind::Note, directory.as_ref())
    }

    async fn move_directory(
        &self,
        directory: NodeKey,
        parent: Option<NodeKey>,
    ) -> Result<(), RequestError> {
        let request = PersistRequest::move_to(NodeKind::Directory, directory.clone(), parent.clone());
        let mut state = self.begin(Some(request))?;
        move_checked(&mut state, &directory, NodeKind::Directory, parent.as_ref())
    }

    async fn update_content(&self, note: NodeKey, content: String) -> Result<(), RequestError> {
        let request = PersistRequest::update_content(note.clone(), content.clone());
        let mut state = self.begin(Some(request))?;
        if !state.tree.require(&note).map_err(reject)?.is_note() {
            return Err(RequestError::rejected(format!("{note} is not a note")));
        }
        state.contents.insert(note, content);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote() -> MemoryRemote {
        MemoryRemote::with_tree(vec![
            TreeNode::directory("d1", "A", None).with_child(TreeNode::note("n1", "x", None)),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_keys() {
        let remote = remote();
        let a = remote.create_node(NodeKind::Note, None).await.unwrap();
        let b = remote
            .create_node(NodeKind::Directory, Some(NodeKey::new("d1")))
            .await
            .unwrap();
        assert_ne!(a.key, b.key);
        assert_eq!(b.parent_key, Some(NodeKey::new("d1")));
        assert_eq!(remote.content(&a.key), Some(String::new()));
    }

    #[tokio::test]
    async fn test_create_skips_taken_keys() {
        let remote =
            MemoryRemote::with_tree(vec![TreeNode::note("note-1", "seeded", None)]).unwrap();
        let node = remote.create_node(NodeKind::Note, None).await.unwrap();
        assert_eq!(node.key, NodeKey::new("note-2"));
    }

    #[tokio::test]
    async fn test_move_endpoint_checks_kind() {
        let remote = remote();
        let err = remote
            .move_note(NodeKey::new("d1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Rejected { .. }));

        remote.move_note(NodeKey::new("n1"), None).await.unwrap();
        assert_eq!(remote.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failure_is_consumed() {
        let remote = remote();
        remote.fail_next(RequestError::network("offline"));
        assert!(remote.fetch_tree().await.is_err());
        assert!(remote.fetch_tree().await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_unknown_is_not_found() {
        let remote = remote();
        let err = remote.delete_node(NodeKey::new("ghost")).await.unwrap_err();
        assert_eq!(
            err,
            RequestError::NotFound {
                key: NodeKey::new("ghost")
            }
        );
        assert_eq!(remote.calls().len(), 1);
    }
}
