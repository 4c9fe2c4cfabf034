//! Log of optimistic mutations awaiting server confirmation.

use std::collections::{HashMap, VecDeque};
use std::mem::{self, Discriminant};
use std::time::SystemTime;

use compact_str::CompactString;

use notetree_core::{Detached, Location, NodeKey, NodeKind};

use crate::request::OpId;

/// An entry in the pending log.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    /// Request this entry belongs to.
    pub id: OpId,
    /// When the local change was applied.
    pub submitted_at: SystemTime,
    /// The local change, with enough data to invert it.
    pub mutation: Optimistic,
    /// Human-readable description.
    pub description: String,
}

impl PendingEntry {
    /// Create a new pending entry.
    pub fn new(id: OpId, mutation: Optimistic, description: impl Into<String>) -> Self {
        Self {
            id,
            submitted_at: SystemTime::now(),
            mutation,
            description: description.into(),
        }
    }
}

/// A local change applied ahead of the server.
#[derive(Debug, Clone)]
pub enum Optimistic {
    /// A node was moved.
    Moved {
        key: NodeKey,
        /// Where it was before.
        from: Location,
        /// Where it went.
        to: Option<NodeKey>,
    },
    /// A node was renamed.
    Renamed {
        key: NodeKey,
        old_name: CompactString,
        new_name: CompactString,
    },
    /// A node and its subtree were removed.
    Deleted { detached: Detached },
    /// A create request is in flight; nothing was applied locally.
    Created {
        kind: NodeKind,
        parent: Option<NodeKey>,
    },
}

impl Optimistic {
    /// Get a description of how to revert this change.
    pub fn revert_description(&self) -> String {
        match self {
            Self::Moved { key, from, .. } => match &from.parent {
                Some(parent) => format!("Move {key} back into {parent}"),
                None => format!("Move {key} back to the root"),
            },
            Self::Renamed { old_name, .. } => format!("Rename back to '{old_name}'"),
            Self::Deleted { detached } => format!("Restore {}", detached.node.key),
            Self::Created { .. } => "Nothing to revert".to_string(),
        }
    }

    /// Check if this change touched the local tree.
    pub fn can_revert(&self) -> bool {
        !matches!(self, Self::Created { .. })
    }

    /// The node this change is about, if it already has a key.
    pub fn key(&self) -> Option<&NodeKey> {
        match self {
            Self::Moved { key, .. } | Self::Renamed { key, .. } => Some(key),
            Self::Deleted { detached } => Some(&detached.node.key),
            Self::Created { .. } => None,
        }
    }
}

/// In-flight optimistic mutations, oldest first.
#[derive(Debug, Default)]
pub struct PendingLog {
    entries: VecDeque<PendingEntry>,
    /// Newest request per node and kind of change. Reset once the log drains.
    latest: HashMap<(NodeKey, Discriminant<Optimistic>), OpId>,
}

impl PendingLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mutation under a request id.
    pub fn record(&mut self, id: OpId, mutation: Optimistic, description: impl Into<String>) {
        if self.entries.is_empty() {
            self.latest.clear();
        }
        if let Some(key) = mutation.key() {
            self.latest
                .insert((key.clone(), mem::discriminant(&mutation)), id);
        }
        self.entries
            .push_back(PendingEntry::new(id, mutation, description));
    }

    /// Record a move.
    pub fn record_move(&mut self, id: OpId, key: NodeKey, from: Location, to: Option<NodeKey>) {
        let desc = match &to {
            Some(parent) => format!("Moved {key} into {parent}"),
            None => format!("Moved {key} to the root"),
        };
        self.record(id, Optimistic::Moved { key, from, to }, desc);
    }

    /// Record a rename.
    pub fn record_rename(
        &mut self,
        id: OpId,
        key: NodeKey,
        old_name: CompactString,
        new_name: CompactString,
    ) {
        let desc = format!("Renamed '{old_name}' to '{new_name}'");
        self.record(
            id,
            Optimistic::Renamed {
                key,
                old_name,
                new_name,
            },
            desc,
        );
    }

    /// Record a delete.
    pub fn record_delete(&mut self, id: OpId, detached: Detached) {
        let desc = format!(
            "Deleted '{}' ({} nodes)",
            detached.node.name,
            detached.node.subtree_len()
        );
        self.record(id, Optimistic::Deleted { detached }, desc);
    }

    /// Record a create request.
    pub fn record_create(&mut self, id: OpId, kind: NodeKind, parent: Option<NodeKey>) {
        let desc = format!("Creating {kind}");
        self.record(id, Optimistic::Created { kind, parent }, desc);
    }

    /// Remove and return the entry for a finished request.
    pub fn take(&mut self, id: OpId) -> Option<PendingEntry> {
        let ix = self.entries.iter().position(|entry| entry.id == id)?;
        self.entries.remove(ix)
    }

    /// Check if a later request made the same kind of change to the same node.
    ///
    /// Stays accurate after the entry for `id` was taken, as long as the log
    /// has not drained and been refilled since.
    pub fn is_superseded(&self, id: OpId, mutation: &Optimistic) -> bool {
        let Some(key) = mutation.key() else {
            return false;
        };
        self.latest
            .get(&(key.clone(), mem::discriminant(mutation)))
            .is_some_and(|latest| *latest > id)
    }

    /// Entries still waiting on the server for a given node.
    pub fn pending_for<'a>(&'a self, key: &'a NodeKey) -> impl Iterator<Item = &'a PendingEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.mutation.key() == Some(key))
    }

    /// Check if a node has unconfirmed changes.
    pub fn is_pending(&self, key: &NodeKey) -> bool {
        self.pending_for(key).next().is_some()
    }

    /// Get the number of entries in the log.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get an iterator over all entries (oldest first).
    pub fn iter(&self) -> impl Iterator<Item = &PendingEntry> {
        self.entries.iter()
    }
}
