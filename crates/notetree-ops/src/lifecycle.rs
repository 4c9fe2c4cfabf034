//! Node lifecycle: optimistic local mutation plus background persistence.

use std::collections::HashMap;
use std::sync::Arc;

use compact_str::CompactString;
use thiserror::Error;
use tokio::sync::mpsc;

use notetree_core::{
    ExplorerConfig, FailurePolicy, NodeKey, NodeKind, TreeError, TreeNode, TreeStore,
};

use crate::content::ContentSync;
use crate::executor::{Completion, RequestExecutor, Response};
use crate::pending::{Optimistic, PendingLog};
use crate::persistence::{Persistence, RequestError};
use crate::request::{OpId, PersistRequest};
use crate::route::{Route, creation_parent};

/// Errors raised synchronously by lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Not a note: {key}")]
    NotANote { key: NodeKey },
}

/// Outcome of applying one completion to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The server accepted a request whose effect was already applied.
    Confirmed { id: OpId, request: PersistRequest },
    /// A created node arrived and was inserted.
    Created { id: OpId, key: NodeKey },
    /// The server refused a request.
    Failed {
        id: OpId,
        request: PersistRequest,
        error: RequestError,
        /// Whether the optimistic change was rolled back.
        reverted: bool,
    },
    /// A successful completion could not be applied locally any more.
    Discarded {
        id: OpId,
        request: PersistRequest,
        reason: TreeError,
    },
}

impl LifecycleEvent {
    /// Request id this event belongs to.
    pub fn id(&self) -> OpId {
        match self {
            Self::Confirmed { id, .. }
            | Self::Created { id, .. }
            | Self::Failed { id, .. }
            | Self::Discarded { id, .. } => *id,
        }
    }

    /// Check if this event reports a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Result of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub id: OpId,
    /// The open note was inside the deleted subtree.
    pub navigated_home: bool,
}

/// Runs once a created node is in the tree, with its server-assigned key.
pub type CreateCallback = Box<dyn FnOnce(&NodeKey) + Send>;

struct PendingCreate {
    callback: Option<CreateCallback>,
    open: bool,
}

/// Drives create, rename, delete and move for one explorer.
///
/// Local changes are applied to the [`TreeStore`] immediately and the
/// matching request is sent in the background. Completions are applied by
/// whoever owns the store, through [`poll`](Self::poll) or
/// [`next_event`](Self::next_event).
pub struct Lifecycle<P: Persistence> {
    executor: RequestExecutor<P>,
    completions: mpsc::Receiver<Completion>,
    pending: PendingLog,
    creates: HashMap<OpId, PendingCreate>,
    route: Route,
    config: ExplorerConfig,
}

impl<P: Persistence> std::fmt::Debug for Lifecycle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("route", &self.route)
            .field("pending", &self.pending.len())
            .field("creates", &self.creates.len())
            .finish_non_exhaustive()
    }
}

impl<P: Persistence> Lifecycle<P> {
    pub fn new(remote: Arc<P>, config: ExplorerConfig) -> Self {
        let (executor, completions) = RequestExecutor::new(remote, config.channel_size.max(1));
        Self {
            executor,
            completions,
            pending: PendingLog::new(),
            creates: HashMap::new(),
            route: Route::Home,
            config,
        }
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Optimistic changes still waiting on the server.
    pub fn pending(&self) -> &PendingLog {
        &self.pending
    }

    pub fn executor(&self) -> &RequestExecutor<P> {
        &self.executor
    }

    pub fn remote(&self) -> &Arc<P> {
        self.executor.remote()
    }

    /// Number of requests that have not completed yet.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Fetch the tree from the server into the store.
    ///
    /// On failure the store is put in the failed state.
    pub async fn load(&mut self, store: &mut TreeStore) -> Result<(), LifecycleError> {
        let nodes = match self.executor.remote().fetch_tree().await {
            Ok(nodes) => nodes,
            Err(err) => {
                store.fail_load(err.to_string());
                return Err(err.into());
            }
        };
        if let Err(err) = store.load(nodes) {
            store.fail_load(err.to_string());
            return Err(err.into());
        }
        Ok(())
    }

    /// Ask the server for a new node.
    ///
    /// Nothing is inserted until the server answers with the node's key;
    /// `on_success` runs after the insert.
    pub fn create(
        &mut self,
        store: &TreeStore,
        kind: NodeKind,
        parent: Option<NodeKey>,
        on_success: Option<CreateCallback>,
    ) -> Result<OpId, LifecycleError> {
        self.submit_create(store, kind, parent, on_success, false)
    }

    /// Create a note next to `anchor` and open it once it exists.
    ///
    /// A directory anchor receives the note; a note anchor shares its parent.
    pub fn create_note(
        &mut self,
        store: &TreeStore,
        anchor: Option<&NodeKey>,
    ) -> Result<OpId, LifecycleError> {
        let parent = self.anchor_parent(store, anchor)?;
        self.submit_create(store, NodeKind::Note, parent, None, true)
    }

    /// Create a directory next to `anchor`.
    pub fn create_directory(
        &mut self,
        store: &TreeStore,
        anchor: Option<&NodeKey>,
    ) -> Result<OpId, LifecycleError> {
        let parent = self.anchor_parent(store, anchor)?;
        self.submit_create(store, NodeKind::Directory, parent, None, false)
    }

    fn anchor_parent(
        &self,
        store: &TreeStore,
        anchor: Option<&NodeKey>,
    ) -> Result<Option<NodeKey>, LifecycleError> {
        match anchor {
            Some(key) => Ok(creation_parent(store.tree().require(key)?)),
            None => Ok(None),
        }
    }

    fn submit_create(
        &mut self,
        store: &TreeStore,
        kind: NodeKind,
        parent: Option<NodeKey>,
        callback: Option<CreateCallback>,
        open: bool,
    ) -> Result<OpId, LifecycleError> {
        if let Some(parent) = &parent {
            if !store.tree().require(parent)?.is_directory() {
                return Err(TreeError::NotADirectory {
                    key: parent.clone(),
                }
                .into());
            }
        }

        let id = self
            .executor
            .dispatch(PersistRequest::create(kind, parent.clone()));
        self.pending.record_create(id, kind, parent);
        self.creates.insert(id, PendingCreate { callback, open });
        Ok(id)
    }

    /// Rename a node locally and persist the new name.
    pub fn rename(
        &mut self,
        store: &mut TreeStore,
        key: &NodeKey,
        name: impl Into<CompactString>,
    ) -> Result<OpId, LifecycleError> {
        let name = name.into();
        let old_name = store.rename(key, name.clone())?;
        let id = self
            .executor
            .dispatch(PersistRequest::rename(key.clone(), name.clone()));
        self.pending.record_rename(id, key.clone(), old_name, name);
        Ok(id)
    }

    /// Delete a node and its subtree locally and persist the delete.
    ///
    /// Navigates home when the open note was removed.
    pub fn delete(
        &mut self,
        store: &mut TreeStore,
        key: &NodeKey,
    ) -> Result<DeleteOutcome, LifecycleError> {
        let detached = store.remove(key)?;
        let navigated_home = self
            .route
            .note_key()
            .is_some_and(|open| detached.keys().any(|k| k == open));
        if navigated_home {
            self.route = Route::Home;
        }

        let id = self.executor.dispatch(PersistRequest::delete(key.clone()));
        self.pending.record_delete(id, detached);
        Ok(DeleteOutcome { id, navigated_home })
    }

    /// Move a node locally and persist through the endpoint for its kind.
    pub fn move_node(
        &mut self,
        store: &mut TreeStore,
        key: &NodeKey,
        new_parent: Option<&NodeKey>,
    ) -> Result<OpId, LifecycleError> {
        let kind = store.tree().require(key)?.kind();
        let from = store.move_node(key, new_parent)?;
        let request = PersistRequest::move_to(kind, key.clone(), new_parent.cloned());
        let id = self.executor.dispatch(request);
        self.pending
            .record_move(id, key.clone(), from, new_parent.cloned());
        Ok(id)
    }

    /// Open a note in the editor and select it.
    pub fn open_note(&mut self, store: &mut TreeStore, key: &NodeKey) -> Result<(), LifecycleError> {
        if !store.tree().require(key)?.is_note() {
            return Err(LifecycleError::NotANote { key: key.clone() });
        }
        self.route = Route::Note(key.clone());
        store.select(Some(key.clone()));
        Ok(())
    }

    /// Focus moved into the editor; the tree loses its selection.
    pub fn focus_editor(&self, store: &mut TreeStore) {
        store.deselect();
    }

    pub fn navigate_home(&mut self) {
        self.route = Route::Home;
    }

    /// Start debounced content saving for a note.
    ///
    /// `server_value` is the content as last fetched; edits equal to it are
    /// never sent.
    pub fn open_editor(
        &self,
        store: &TreeStore,
        key: &NodeKey,
        server_value: impl Into<String>,
    ) -> Result<ContentSync, LifecycleError> {
        if !store.tree().require(key)?.is_note() {
            return Err(LifecycleError::NotANote { key: key.clone() });
        }
        Ok(ContentSync::spawn(
            self.executor.clone(),
            key.clone(),
            server_value.into(),
            self.config.content_debounce(),
        ))
    }

    /// Apply every completion that has already arrived.
    pub fn poll(&mut self, store: &mut TreeStore) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        while let Ok(completion) = self.completions.try_recv() {
            events.push(self.apply(store, completion));
        }
        events
    }

    /// Wait for the next completion and apply it.
    pub async fn next_event(&mut self, store: &mut TreeStore) -> Option<LifecycleEvent> {
        let completion = self.completions.recv().await?;
        Some(self.apply(store, completion))
    }

    /// Apply completions until no tracked request is in flight.
    pub async fn settle(&mut self, store: &mut TreeStore) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        while !self.pending.is_empty() {
            match self.next_event(store).await {
                Some(event) => events.push(event),
                None => break,
            }
        }
        events
    }

    /// Apply one completion to the store.
    pub fn apply(&mut self, store: &mut TreeStore, completion: Completion) -> LifecycleEvent {
        let Completion {
            id,
            request,
            result,
        } = completion;
        let entry = self.pending.take(id);

        match result {
            Ok(Response::Created(node)) => self.finish_create(store, id, request, node),
            Ok(Response::Done) => {
                tracing::debug!(target: "lifecycle", %id, kind = %request.request_type(), "request confirmed");
                LifecycleEvent::Confirmed { id, request }
            }
            Err(error) => {
                self.creates.remove(&id);
                let reverted = match (self.config.failure_policy, entry) {
                    (FailurePolicy::Revert, Some(entry))
                        if self.pending.is_superseded(id, &entry.mutation) =>
                    {
                        tracing::debug!(target: "lifecycle", %id, "failed change superseded; not reverted");
                        false
                    }
                    (FailurePolicy::Revert, Some(entry)) => revert(store, &entry.mutation),
                    _ => false,
                };
                tracing::warn!(
                    target: "lifecycle",
                    %id,
                    kind = %request.request_type(),
                    %error,
                    reverted,
                    "request failed"
                );
                LifecycleEvent::Failed {
                    id,
                    request,
                    error,
                    reverted,
                }
            }
        }
    }

    fn finish_create(
        &mut self,
        store: &mut TreeStore,
        id: OpId,
        request: PersistRequest,
        node: TreeNode,
    ) -> LifecycleEvent {
        let waiting = self.creates.remove(&id);
        let key = node.key.clone();
        let parent = node.parent_key.clone();

        if let Err(reason) = store.insert(node) {
            tracing::warn!(target: "lifecycle", %id, %key, %reason, "created node dropped");
            return LifecycleEvent::Discarded {
                id,
                request,
                reason,
            };
        }
        if let Some(parent) = &parent {
            store.set_expanded(parent, true);
        }
        tracing::debug!(target: "lifecycle", %id, %key, "node created");

        if let Some(PendingCreate { callback, open }) = waiting {
            if open {
                self.route = Route::Note(key.clone());
                store.select(Some(key.clone()));
            }
            if let Some(callback) = callback {
                callback(&key);
            }
        }
        LifecycleEvent::Created { id, key }
    }
}

/// Undo an optimistic change if the store still reflects it.
fn revert(store: &mut TreeStore, mutation: &Optimistic) -> bool {
    let result = match mutation {
        Optimistic::Moved { key, from, to } => {
            match store.node(key) {
                Some(node) if node.parent_key() == to.as_ref() => {}
                _ => return false,
            }
            store.restore_location(key, from)
        }
        Optimistic::Renamed {
            key,
            old_name,
            new_name,
        } => {
            match store.node(key) {
                Some(node) if node.name() == new_name.as_str() => {}
                _ => return false,
            }
            store.rename(key, old_name.clone()).map(|_| ())
        }
        Optimistic::Deleted { detached } => {
            store.insert_at(detached.node.clone(), detached.location.index)
        }
        Optimistic::Created { .. } => return false,
    };

    match result {
        Ok(()) => {
            tracing::debug!(target: "lifecycle", change = %mutation.revert_description(), "reverted");
            true
        }
        Err(err) => {
            tracing::warn!(target: "lifecycle", error = %err, "could not revert");
            false
        }
    }
}
