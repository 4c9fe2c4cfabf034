//! Drop zones and pointer-within hit-testing.

use std::cmp::Ordering;

use notetree_core::{NodeKey, NoteTree};

use crate::error::DndError;
use crate::geometry::{Point, Rect};

/// Where a dragged node can land.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DropTarget {
    /// The implicit root; dropping here makes the node root-level.
    Root,
    /// A directory.
    Directory(NodeKey),
}

impl DropTarget {
    /// The parent key a drop here results in.
    pub fn parent_key(&self) -> Option<&NodeKey> {
        match self {
            Self::Root => None,
            Self::Directory(key) => Some(key),
        }
    }
}

#[derive(Debug, Clone)]
struct DropZone {
    target: DropTarget,
    bounds: Rect,
    depth: usize,
}

/// Registered drop zones for the current layout.
///
/// Only directories and the root register. When zones overlap, the one
/// nested deepest in the tree wins, then the smallest.
#[derive(Debug, Clone, Default)]
pub struct DropZoneRegistry {
    zones: Vec<DropZone>,
}

impl DropZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the root zone, usually the whole tree panel.
    pub fn register_root(&mut self, bounds: Rect) {
        self.upsert(DropZone {
            target: DropTarget::Root,
            bounds,
            depth: 0,
        });
    }

    /// Register a directory row (with its expanded children) as a zone.
    pub fn register_directory(
        &mut self,
        tree: &NoteTree,
        key: &NodeKey,
        bounds: Rect,
    ) -> Result<(), DndError> {
        let node = tree
            .get(key)
            .ok_or_else(|| DndError::UnknownNode { key: key.clone() })?;
        if !node.is_directory() {
            tracing::error!(target: "dnd", %key, "note registered as a drop zone");
            return Err(DndError::NotADropTarget { key: key.clone() });
        }
        self.upsert(DropZone {
            target: DropTarget::Directory(key.clone()),
            bounds,
            depth: tree.depth(key) + 1,
        });
        Ok(())
    }

    /// Remove a zone. Returns whether it was registered.
    pub fn unregister(&mut self, target: &DropTarget) -> bool {
        let before = self.zones.len();
        self.zones.retain(|zone| zone.target != *target);
        self.zones.len() != before
    }

    pub fn clear(&mut self) {
        self.zones.clear();
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// The innermost zone containing `point`.
    pub fn hit_test(&self, point: Point) -> Option<&DropTarget> {
        self.zones
            .iter()
            .filter(|zone| zone.bounds.contains(point))
            .min_by(|a, b| innermost_first(a, b))
            .map(|zone| &zone.target)
    }

    fn upsert(&mut self, zone: DropZone) {
        match self.zones.iter_mut().find(|z| z.target == zone.target) {
            Some(existing) => *existing = zone,
            None => self.zones.push(zone),
        }
    }
}

fn innermost_first(a: &DropZone, b: &DropZone) -> Ordering {
    b.depth
        .cmp(&a.depth)
        .then_with(|| a.bounds.area().total_cmp(&b.bounds.area()))
}
