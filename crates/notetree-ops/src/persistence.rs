//! Contract with the remote store.

use std::future::Future;

use compact_str::CompactString;
use thiserror::Error;

use notetree_core::{NodeKey, NodeKind, TreeNode};

/// Errors returned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The request never reached the server or the connection failed.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The server refused the request.
    #[error("Request rejected: {message}")]
    Rejected { message: String },

    /// The server does not know this node.
    #[error("Not found on server: {key}")]
    NotFound { key: NodeKey },
}

impl RequestError {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a rejection error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// Transport-agnostic access to the remote note store.
///
/// Implementations are shared between request tasks, so every future must
/// be `Send`.
pub trait Persistence: Send + Sync + 'static {
    /// Fetch the whole nested tree.
    fn fetch_tree(&self) -> impl Future<Output = Result<Vec<TreeNode>, RequestError>> + Send;

    /// Create a node and return it with its server-assigned key.
    fn create_node(
        &self,
        kind: NodeKind,
        parent: Option<NodeKey>,
    ) -> impl Future<Output = Result<TreeNode, RequestError>> + Send;

    /// Rename a node.
    fn rename_node(
        &self,
        key: NodeKey,
        name: CompactString,
    ) -> impl Future<Output = Result<(), RequestError>> + Send;

    /// Delete a node and its subtree.
    fn delete_node(&self, key: NodeKey) -> impl Future<Output = Result<(), RequestError>> + Send;

    /// Move a note into a directory, or to the root for `None`.
    fn move_note(
        &self,
        note: NodeKey,
        directory: Option<NodeKey>,
    ) -> impl Future<Output = Result<(), RequestError>> + Send;

    /// Move a directory under another directory, or to the root for `None`.
    fn move_directory(
        &self,
        directory: NodeKey,
        parent: Option<NodeKey>,
    ) -> impl Future<Output = Result<(), RequestError>> + Send;

    /// Replace a note's content.
    fn update_content(
        &self,
        note: NodeKey,
        content: String,
    ) -> impl Future<Output = Result<(), RequestError>> + Send;
}
