//! Drag gesture state machine.

use std::mem;

use notetree_core::{NodeKey, TreeError, TreeStore};
use notetree_ops::{Lifecycle, LifecycleError, OpId, Persistence};

use crate::error::DndError;
use crate::geometry::Point;
use crate::payload::DragPayload;
use crate::preview::DragPreview;
use crate::zone::{DropTarget, DropZoneRegistry};

/// An active drag.
#[derive(Debug, Clone, PartialEq)]
pub struct Gesture {
    pub payload: DragPayload,
    pub origin: Point,
    pub pointer: Point,
    /// Target under the pointer after the last move.
    pub over: Option<DropTarget>,
}

/// Coordinator state.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(Gesture),
}

/// How a gesture ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// Released outside every drop zone.
    Discarded,
    /// Released over the node's current parent; nothing was sent.
    SelfDrop { target: DropTarget },
    /// The node was moved and the request dispatched.
    Moved { id: OpId, target: DropTarget },
    /// The store refused the move, e.g. a directory dropped into its own
    /// subtree.
    Rejected(TreeError),
}

/// Turns pointer events into tree moves.
#[derive(Debug, Default)]
pub struct DragCoordinator {
    state: DragState,
    zones: DropZoneRegistry,
}

impl DragCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn zones(&self) -> &DropZoneRegistry {
        &self.zones
    }

    /// Zones are re-registered by the view whenever the layout changes.
    pub fn zones_mut(&mut self) -> &mut DropZoneRegistry {
        &mut self.zones
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    /// Payload of the active gesture.
    pub fn payload(&self) -> Option<&DragPayload> {
        match &self.state {
            DragState::Idle => None,
            DragState::Dragging(gesture) => Some(&gesture.payload),
        }
    }

    /// Target currently under the pointer.
    pub fn over(&self) -> Option<&DropTarget> {
        match &self.state {
            DragState::Idle => None,
            DragState::Dragging(gesture) => gesture.over.as_ref(),
        }
    }

    /// Check if a row is hidden because it is being dragged.
    pub fn is_hidden(&self, key: &NodeKey) -> bool {
        self.payload().is_some_and(|payload| payload.key() == key)
    }

    /// Preview for the active gesture.
    pub fn preview(&self) -> Option<DragPreview> {
        match &self.state {
            DragState::Idle => None,
            DragState::Dragging(gesture) => Some(DragPreview::new(
                &gesture.payload,
                gesture.origin,
                gesture.pointer,
                gesture.over.as_ref(),
            )),
        }
    }

    /// Start dragging `key`.
    pub fn pointer_down(
        &mut self,
        store: &TreeStore,
        key: &NodeKey,
        point: Point,
    ) -> Result<&DragPayload, DndError> {
        if let DragState::Dragging(gesture) = &self.state {
            tracing::error!(target: "dnd", active = %gesture.payload.key(), %key, "drag started twice");
            return Err(DndError::AlreadyDragging {
                key: gesture.payload.key().clone(),
            });
        }
        let Some(node) = store.node(key) else {
            tracing::error!(target: "dnd", %key, "drag started on unknown node");
            return Err(DndError::UnknownNode { key: key.clone() });
        };

        let payload = DragPayload::from_node(node);
        tracing::debug!(target: "dnd", %key, kind = %payload.kind(), "drag started");
        self.state = DragState::Dragging(Gesture {
            payload,
            origin: point,
            pointer: point,
            over: self.zones.hit_test(point).cloned(),
        });
        match &self.state {
            DragState::Dragging(gesture) => Ok(&gesture.payload),
            DragState::Idle => Err(DndError::NoActiveGesture),
        }
    }

    /// Track the pointer. Returns the target now under it.
    pub fn pointer_move(&mut self, point: Point) -> Result<Option<&DropTarget>, DndError> {
        let DragState::Dragging(gesture) = &mut self.state else {
            return Err(DndError::NoActiveGesture);
        };
        let over = self.zones.hit_test(point).cloned();
        if over != gesture.over {
            tracing::trace!(target: "dnd", key = %gesture.payload.key(), ?over, "drop target changed");
        }
        gesture.pointer = point;
        gesture.over = over;
        Ok(gesture.over.as_ref())
    }

    /// Abandon the gesture. Returns whether one was active.
    pub fn cancel(&mut self) -> bool {
        match mem::take(&mut self.state) {
            DragState::Idle => false,
            DragState::Dragging(gesture) => {
                tracing::debug!(target: "dnd", key = %gesture.payload.key(), "drag cancelled");
                true
            }
        }
    }

    /// Release the pointer and perform the move, if any.
    pub fn pointer_up<P: Persistence>(
        &mut self,
        point: Point,
        lifecycle: &mut Lifecycle<P>,
        store: &mut TreeStore,
    ) -> Result<DropOutcome, DndError> {
        let DragState::Dragging(gesture) = mem::take(&mut self.state) else {
            return Err(DndError::NoActiveGesture);
        };
        let payload = gesture.payload;
        let key = payload.key();

        let Some(target) = self.zones.hit_test(point).cloned() else {
            tracing::debug!(target: "dnd", %key, "dropped outside any zone");
            return Ok(DropOutcome::Discarded);
        };

        if target.parent_key() == payload.parent_key() {
            tracing::debug!(target: "dnd", %key, "dropped onto own parent");
            return Ok(DropOutcome::SelfDrop { target });
        }

        if let DropTarget::Directory(dir) = &target {
            if !store.tree().contains(dir) {
                tracing::error!(target: "dnd", %key, directory = %dir, "drop target vanished during drag");
                return Err(DndError::UnresolvedTarget { key: dir.clone() });
            }
        }

        match lifecycle.move_node(store, key, target.parent_key()) {
            Ok(id) => {
                if lifecycle.config().expand_on_drop {
                    if let Some(dir) = target.parent_key() {
                        store.set_expanded(dir, true);
                    }
                }
                tracing::debug!(target: "dnd", %key, %id, destination = ?target, "dropped");
                Ok(DropOutcome::Moved { id, target })
            }
            Err(LifecycleError::Tree(err)) if err.is_noop() => {
                Ok(DropOutcome::SelfDrop { target })
            }
            Err(LifecycleError::Tree(err)) => {
                tracing::debug!(target: "dnd", %key, error = %err, "drop rejected");
                Ok(DropOutcome::Rejected(err))
            }
            Err(err) => Err(err.into()),
        }
    }
}
