//! Linear undo/redo log of whole-graph snapshots.
//!
//! DESIGN
//! ======
//! Each entry stores the full snapshot produced by one step, so undo and
//! redo are plain cursor moves with no inverse operations per edit type.
//! Memory is O(nodes) per entry in the worst case; structural sharing via
//! `Arc` only avoids copies for steps that did not change the map.
//!
//! The entry at the cursor is always what the live store must show.
//! Recording after an undo discards everything past the cursor.

use serde::{Deserialize, Serialize};

use super::node::NodeId;
use super::store::Snapshot;

/// Kind of step recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Add,
    Update,
    Delete,
}

/// One immutable step.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub kind: EntryKind,
    /// Affected ids, or `None` when they must be derived by comparing
    /// against the previous entry.
    pub diff: Option<Vec<NodeId>>,
    /// State after the step.
    pub nodes: Snapshot,
}

impl HistoryEntry {
    #[must_use]
    pub fn new(kind: EntryKind, diff: Option<Vec<NodeId>>, nodes: Snapshot) -> Self {
        Self { kind, diff, nodes }
    }
}

/// Undo/redo log with a cursor.
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
    cursor: usize,
    /// Maximum number of retained entries; 0 means unbounded.
    limit: usize,
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A log that keeps at most `limit` entries (0 = unbounded).
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self { entries: Vec::new(), cursor: 0, limit }
    }

    /// Drop all entries and start over from `snapshot` at cursor 0.
    pub fn seed(&mut self, snapshot: Snapshot) {
        self.entries.clear();
        self.entries.push(HistoryEntry::new(EntryKind::Update, None, snapshot));
        self.cursor = 0;
    }

    /// Append after the cursor, discarding any redo tail first.
    pub fn record(&mut self, entry: HistoryEntry) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push(entry);
        if self.limit > 0 && self.entries.len() > self.limit {
            let excess = self.entries.len() - self.limit;
            self.entries.drain(..excess);
        }
        self.cursor = self.entries.len() - 1;
    }

    /// Step back. Returns the snapshot the store must now show, or `None`
    /// when already at the oldest entry.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if self.cursor == 0 || self.entries.is_empty() {
            return None;
        }
        self.cursor -= 1;
        Some(&self.entries[self.cursor].nodes)
    }

    /// Step forward. Returns `None` when already at the newest entry.
    pub fn redo(&mut self) -> Option<&Snapshot> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(&self.entries[self.cursor].nodes)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
