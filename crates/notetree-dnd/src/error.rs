//! Error types for drag gestures.

use thiserror::Error;

use notetree_core::NodeKey;
use notetree_ops::LifecycleError;

/// Errors raised by the drag coordinator.
///
/// These indicate wiring bugs in the caller, not user mistakes; a rejected
/// drop is reported through [`DropOutcome`](crate::DropOutcome) instead.
#[derive(Debug, Error)]
pub enum DndError {
    #[error("No drag gesture in progress")]
    NoActiveGesture,

    #[error("A drag gesture is already in progress for {key}")]
    AlreadyDragging { key: NodeKey },

    #[error("Cannot drag unknown node: {key}")]
    UnknownNode { key: NodeKey },

    #[error("Only directories can be drop targets: {key}")]
    NotADropTarget { key: NodeKey },

    #[error("Drop target no longer exists: {key}")]
    UnresolvedTarget { key: NodeKey },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
