//! Debounced persistence of a note's content.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use notetree_core::NodeKey;

use crate::executor::RequestExecutor;
use crate::persistence::Persistence;
use crate::request::PersistRequest;

/// Background task that saves editor content after a quiet period.
///
/// Every [`change`](Self::change) restarts the quiet period. When it elapses
/// the latest value is sent as an update-content request, unless it equals
/// the last value the server accepted. Completions arrive on the
/// owning [`Lifecycle`](crate::Lifecycle)'s channel.
#[derive(Debug)]
pub struct ContentSync {
    key: NodeKey,
    changes: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ContentSync {
    /// Start syncing `key`, whose server copy currently holds `server_value`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<P: Persistence>(
        executor: RequestExecutor<P>,
        key: NodeKey,
        server_value: String,
        quiet: Duration,
    ) -> Self {
        let (changes, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            executor,
            key.clone(),
            server_value,
            quiet,
            rx,
            cancel.clone(),
        ));
        Self {
            key,
            changes,
            cancel,
            handle: Some(handle),
        }
    }

    /// Note being synced.
    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    /// Report the editor's current value.
    pub fn change(&self, value: impl Into<String>) {
        // Fails only after close; the value is dropped with the editor.
        let _ = self.changes.send(value.into());
    }

    /// Stop syncing. A change still inside its quiet period is not sent; a
    /// save already sent is waited for.
    pub async fn close(mut self) {
        self.cancel.cancel();
        let Some(handle) = self.handle.take() else {
            return;
        };
        if let Err(err) = handle.await {
            tracing::warn!(target: "lifecycle", key = %self.key, error = %err, "content sync task failed");
        }
    }
}

impl Drop for ContentSync {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run<P: Persistence>(
    executor: RequestExecutor<P>,
    key: NodeKey,
    mut saved: String,
    quiet: Duration,
    mut rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    let mut draft: Option<String> = None;
    let mut deadline = Instant::now();

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            change = rx.recv() => match change {
                Some(value) => {
                    draft = Some(value);
                    deadline = Instant::now() + quiet;
                }
                None => break,
            },

            _ = tokio::time::sleep_until(deadline), if draft.is_some() => {
                let Some(value) = draft.take() else { continue };
                if value == saved {
                    continue;
                }
                tracing::debug!(target: "lifecycle", %key, len = value.len(), "saving content");
                let request = PersistRequest::update_content(key.clone(), value.clone());
                if executor.perform(request).await {
                    saved = value;
                } else {
                    tracing::warn!(target: "lifecycle", %key, "content not saved");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use notetree_core::TreeNode;

    use crate::memory::MemoryRemote;
    use crate::persistence::RequestError;

    fn remote() -> Arc<MemoryRemote> {
        Arc::new(MemoryRemote::with_tree(vec![TreeNode::note("n1", "x", None)]).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_saved_once() {
        let remote = remote();
        let (executor, mut rx) = RequestExecutor::new(Arc::clone(&remote), 8);
        let sync = ContentSync::spawn(
            executor,
            NodeKey::new("n1"),
            String::new(),
            Duration::from_millis(400),
        );

        sync.change("h");
        sync.change("he");
        sync.change("hello");

        let completion = rx.recv().await.unwrap();
        assert_eq!(
            completion.request,
            PersistRequest::update_content(NodeKey::new("n1"), "hello".to_string())
        );
        assert_eq!(remote.calls().len(), 1);
        assert_eq!(remote.content(&NodeKey::new("n1")).as_deref(), Some("hello"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_value_is_not_sent() {
        let remote = remote();
        let (executor, mut rx) = RequestExecutor::new(Arc::clone(&remote), 8);
        let sync = ContentSync::spawn(
            executor,
            NodeKey::new("n1"),
            "same".to_string(),
            Duration::from_millis(400),
        );

        sync.change("other");
        sync.change("same");

        let waited = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(!matches!(waited, Ok(Some(_))));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_is_retried_with_same_value() {
        let remote = remote();
        remote.fail_next(RequestError::network("offline"));
        let (executor, mut rx) = RequestExecutor::new(Arc::clone(&remote), 8);
        let sync = ContentSync::spawn(
            executor,
            NodeKey::new("n1"),
            String::new(),
            Duration::from_millis(400),
        );

        sync.change("hello");
        let failed = rx.recv().await.unwrap();
        assert!(failed.result.is_err());

        sync.change("hello!");
        sync.change("hello");
        let retried = rx.recv().await.unwrap();
        assert_eq!(
            retried.request,
            PersistRequest::update_content(NodeKey::new("n1"), "hello".to_string())
        );
        assert!(retried.result.is_ok());
        assert_eq!(remote.content(&NodeKey::new("n1")).as_deref(), Some("hello"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_drops_pending_change() {
        let remote = remote();
        let (executor, mut rx) = RequestExecutor::new(Arc::clone(&remote), 8);
        let sync = ContentSync::spawn(
            executor,
            NodeKey::new("n1"),
            String::new(),
            Duration::from_millis(400),
        );

        sync.change("draft");
        tokio::time::sleep(Duration::from_millis(100)).await;
        sync.close().await;

        let waited = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(!matches!(waited, Ok(Some(_))));
        assert!(remote.calls().is_empty());
    }
}
