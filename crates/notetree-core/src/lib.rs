//! Core types for notetree.
//!
//! This crate provides the note/directory tree model, the key-indexed arena
//! it is stored in, and the [`TreeStore`] that owns expansion and selection
//! state on top of it.

mod config;
mod error;
mod node;
mod store;
mod tree;

pub use config::{ExplorerConfig, ExplorerConfigBuilder, FailurePolicy};
pub use error::TreeError;
pub use node::{Node, NodeKey, NodeKind, TreeNode};
pub use store::{LoadState, TreeStore};
pub use tree::{Detached, Location, NoteTree};
