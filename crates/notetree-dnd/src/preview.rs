//! Floating preview of the dragged node.

use notetree_core::{NodeKey, NodeKind};

use crate::geometry::Point;
use crate::payload::DragPayload;
use crate::zone::DropTarget;

/// What to draw under the pointer while dragging.
///
/// Built from the gesture alone, so it stays valid while the original row is
/// hidden from the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DragPreview {
    pub key: NodeKey,
    pub kind: NodeKind,
    pub name: String,
    /// The hovered target, i.e. where the node would land.
    pub parent_key: Option<NodeKey>,
    pub over: Option<DropTarget>,
    /// Releasing now would move the node.
    pub droppable: bool,
    /// Pointer travel since the gesture started.
    pub offset: Point,
}

impl DragPreview {
    pub(crate) fn new(
        payload: &DragPayload,
        origin: Point,
        pointer: Point,
        over: Option<&DropTarget>,
    ) -> Self {
        let parent_key = over.and_then(DropTarget::parent_key).cloned();
        let droppable = over.is_some() && parent_key.as_ref() != payload.parent_key();
        Self {
            key: payload.key().clone(),
            kind: payload.kind(),
            name: payload.name().to_string(),
            parent_key,
            over: over.cloned(),
            droppable,
            offset: pointer.offset_from(origin),
        }
    }
}
