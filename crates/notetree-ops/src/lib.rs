//! Node lifecycle operations for notetree.
//!
//! Create, rename, delete and move are applied to the local [`TreeStore`]
//! first and persisted in the background through a [`Persistence`]
//! implementation. Completions come back over a channel and are applied by
//! the store's owner via [`Lifecycle::poll`] or [`Lifecycle::next_event`].
//!
//! [`TreeStore`]: notetree_core::TreeStore

mod content;
mod editor;
mod executor;
mod lifecycle;
mod memory;
mod pending;
mod persistence;
mod request;
mod route;

pub use content::ContentSync;
pub use editor::NameEditor;
pub use executor::{execute, Completion, RequestExecutor, Response};
pub use lifecycle::{CreateCallback, DeleteOutcome, Lifecycle, LifecycleError, LifecycleEvent};
pub use memory::MemoryRemote;
pub use pending::{Optimistic, PendingEntry, PendingLog};
pub use persistence::{Persistence, RequestError};
pub use request::{OpId, PersistRequest, RequestType};
pub use route::{copy_link, creation_parent, page_title, Route};
