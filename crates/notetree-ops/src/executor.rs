//! Request executor with unified completion delivery.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use notetree_core::TreeNode;

use crate::persistence::{Persistence, RequestError};
use crate::request::{OpId, PersistRequest};

/// Successful outcome of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// A node was created; carries the server's copy.
    Created(TreeNode),
    /// The request was applied.
    Done,
}

/// A finished request, delivered back to the owner of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Identifier returned by [`RequestExecutor::dispatch`].
    pub id: OpId,
    /// The request that was executed.
    pub request: PersistRequest,
    /// What the server said.
    pub result: Result<Response, RequestError>,
}

/// Runs persistence requests in the background.
///
/// Each dispatched request runs on its own tokio task. Completions arrive on
/// the receiver returned by [`RequestExecutor::new`] in the order the server
/// answers them, never re-entrantly.
pub struct RequestExecutor<P> {
    remote: Arc<P>,
    tx: mpsc::Sender<Completion>,
    next_id: Arc<AtomicU64>,
}

impl<P> Clone for RequestExecutor<P> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            tx: self.tx.clone(),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<P> std::fmt::Debug for RequestExecutor<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<P: Persistence> RequestExecutor<P> {
    /// Create an executor and the receiver its completions are sent to.
    pub fn new(remote: Arc<P>, channel_size: usize) -> (Self, mpsc::Receiver<Completion>) {
        let (tx, rx) = mpsc::channel(channel_size);
        let executor = Self {
            remote,
            tx,
            next_id: Arc::new(AtomicU64::new(0)),
        };
        (executor, rx)
    }

    /// The remote store requests are sent to.
    pub fn remote(&self) -> &Arc<P> {
        &self.remote
    }

    /// Send a request in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, request: PersistRequest) -> OpId {
        let id = self.allocate();
        let remote = Arc::clone(&self.remote);
        let tx = self.tx.clone();
        tracing::debug!(target: "lifecycle", %id, kind = %request.request_type(), "dispatching request");

        tokio::spawn(async move {
            let result = execute(remote.as_ref(), request.clone()).await;
            // The receiver is gone when the explorer was torn down; late
            // completions are simply dropped.
            let _ = tx.send(Completion { id, request, result }).await;
        });
        id
    }

    /// Send a request on the current task and wait for the server.
    ///
    /// The completion is still delivered on the channel. Returns whether the
    /// server accepted the request.
    pub async fn perform(&self, request: PersistRequest) -> bool {
        let id = self.allocate();
        tracing::debug!(target: "lifecycle", %id, kind = %request.request_type(), "performing request");

        let result = execute(self.remote.as_ref(), request.clone()).await;
        let accepted = result.is_ok();
        let _ = self.tx.send(Completion { id, request, result }).await;
        accepted
    }

    fn allocate(&self) -> OpId {
        OpId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// Execute a single request against the remote.
pub async fn execute<P: Persistence>(
    remote: &P,
    request: PersistRequest,
) -> Result<Response, RequestError> {
    match request {
        PersistRequest::Create { kind, parent } => {
            remote.create_node(kind, parent).await.map(Response::Created)
        }
        PersistRequest::Rename { key, name } => {
            remote.rename_node(key, name).await.map(|()| Response::Done)
        }
        PersistRequest::Delete { key } => remote.delete_node(key).await.map(|()| Response::Done),
        PersistRequest::MoveNote { note, directory } => {
            remote.move_note(note, directory).await.map(|()| Response::Done)
        }
        PersistRequest::MoveDirectory { directory, parent } => remote
            .move_directory(directory, parent)
            .await
            .map(|()| Response::Done),
        PersistRequest::UpdateContent { note, content } => remote
            .update_content(note, content)
            .await
            .map(|()| Response::Done),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRemote;
    use notetree_core::{NodeKey, NodeKind};

    #[tokio::test]
    async fn test_dispatch_delivers_completion() {
        let remote = Arc::new(MemoryRemote::new());
        let (executor, mut rx) = RequestExecutor::new(remote, 8);

        let id = executor.dispatch(PersistRequest::create(NodeKind::Directory, None));
        let completion = rx.recv().await.unwrap();

        assert_eq!(completion.id, id);
        assert!(matches!(completion.result, Ok(Response::Created(_))));
    }

    #[tokio::test]
    async fn test_ids_are_unique_across_clones() {
        let remote = Arc::new(MemoryRemote::new());
        let (executor, _rx) = RequestExecutor::new(remote, 8);
        let clone = executor.clone();
        let a = executor.dispatch(PersistRequest::create(NodeKind::Note, None));
        let b = clone.dispatch(PersistRequest::create(NodeKind::Note, None));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_perform_reports_acceptance() {
        let remote = Arc::new(MemoryRemote::new());
        let (executor, mut rx) = RequestExecutor::new(Arc::clone(&remote), 8);

        assert!(executor.perform(PersistRequest::create(NodeKind::Note, None)).await);
        remote.fail_next(RequestError::network("offline"));
        assert!(!executor.perform(PersistRequest::create(NodeKind::Note, None)).await);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(first.result.is_ok());
        assert!(second.result.is_err());
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_failure_is_delivered() {
        let remote = Arc::new(MemoryRemote::new());
        let (executor, mut rx) = RequestExecutor::new(remote, 8);

        executor.dispatch(PersistRequest::delete(NodeKey::new("ghost")));
        let completion = rx.recv().await.unwrap();
        assert!(matches!(
            completion.result,
            Err(RequestError::NotFound { .. })
        ));
    }
}
