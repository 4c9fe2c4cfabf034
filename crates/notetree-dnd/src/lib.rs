//! Drag-and-drop reparenting for notetree.
//!
//! A [`DragCoordinator`] sits between raw pointer events and the
//! [`Lifecycle`](notetree_ops::Lifecycle): it captures a [`DragPayload`] when
//! a gesture starts, hit-tests registered [`DropZoneRegistry`] zones while the
//! pointer moves, and turns the release into a single move request.

mod coordinator;
mod error;
mod geometry;
mod payload;
mod preview;
mod zone;

pub use coordinator::{DragCoordinator, DragState, DropOutcome, Gesture};
pub use error::DndError;
pub use geometry::{Point, Rect};
pub use payload::DragPayload;
pub use preview::DragPreview;
pub use zone::{DropTarget, DropZoneRegistry};
