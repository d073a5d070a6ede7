//! Per-client editing session: live store, history, and pending effects.
//!
//! DESIGN
//! ======
//! A `GraphSession` is owned by exactly one connection task and is never
//! shared, so none of its state needs locking. It is created when the
//! client joins a room (seeded from the persisted graph) and dropped when
//! the client leaves.
//!
//! Every operation completes its in-memory transition synchronously and
//! returns a `Transition` describing what changed. Local edits also carry
//! `Effect`s (persist, publish) that the caller hands to the effect
//! scheduler; the session itself never performs I/O. Remote edits and
//! history moves carry no effects.

use uuid::Uuid;

use super::applier::{self, Applied, EditKind, GraphError};
use super::history::{History, HistoryEntry};
use super::keymap::{self, HistoryCommand, KeyChord};
use super::node::{Node, NodeId, NodePatch, ShapeType, ToolConfig};
use super::reconcile::{self, ReconcileError, RemoteEdit};
use super::store::{GraphStore, Snapshot};

/// Where a change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
    Load,
}

/// Side effect to run after a local edit. Executed outside the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Upsert `nodes` and remove `removed` in the room's persisted document.
    Persist { room_id: Uuid, nodes: Vec<Node>, removed: Vec<NodeId> },
    /// Send the edit to room peers.
    Publish { room_id: Uuid, edit: RemoteEdit },
}

/// Outcome of a state-changing operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub origin: Origin,
    /// Edit tag, or `None` for undo/redo and loads.
    pub edit: Option<EditKind>,
    /// Current records of every changed node that still exists.
    pub changed: Vec<Node>,
    /// Ids that no longer exist.
    pub removed: Vec<NodeId>,
    pub effects: Vec<Effect>,
}

/// Editing state for one client in one room.
#[derive(Debug)]
pub struct GraphSession {
    room_id: Uuid,
    store: GraphStore,
    history: History,
    tool: ToolConfig,
    canvas_active: bool,
}

impl GraphSession {
    /// Open a session on a freshly loaded graph. History starts with the
    /// loaded state as its only entry.
    #[must_use]
    pub fn open(room_id: Uuid, loaded: Snapshot, tool: ToolConfig, history_limit: usize) -> Self {
        let mut session = Self {
            room_id,
            store: GraphStore::new(),
            history: History::with_limit(history_limit),
            tool,
            canvas_active: true,
        };
        session.load(loaded);
        session
    }

    #[must_use]
    pub fn room_id(&self) -> Uuid {
        self.room_id
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    #[must_use]
    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    #[must_use]
    pub fn tool(&self) -> &ToolConfig {
        &self.tool
    }

    pub fn set_tool(&mut self, patch: &NodePatch) {
        self.tool.merge(patch);
    }

    #[must_use]
    pub fn canvas_active(&self) -> bool {
        self.canvas_active
    }

    /// Keyboard shortcuts only apply while the canvas view has focus.
    pub fn set_canvas_active(&mut self, active: bool) {
        self.canvas_active = active;
    }

    // =========================================================================
    // LOAD
    // =========================================================================

    /// Replace everything with a persisted snapshot and reset history to it.
    pub fn load(&mut self, snapshot: Snapshot) -> Transition {
        let diff = self.store.current().diff(&snapshot);
        self.store.replace_all(snapshot.clone());
        self.history.seed(snapshot);
        Transition {
            origin: Origin::Load,
            edit: None,
            changed: self.records(&diff.changed),
            removed: diff.removed,
            effects: Vec::new(),
        }
    }

    // =========================================================================
    // LOCAL EDITS
    // =========================================================================

    /// Add a node at `(x, y)` using the active tool, optionally overriding
    /// its shape.
    ///
    /// # Errors
    ///
    /// `InvalidField` if the position is not finite.
    pub fn add_node(&mut self, x: f64, y: f64, shape: Option<ShapeType>) -> Result<Transition, GraphError> {
        let mut node = self.tool.node_at(Uuid::new_v4().to_string(), x, y);
        if let Some(shape) = shape {
            node.shape_type = shape;
        }
        let applied = applier::add_node(self.store.current(), node)?;
        Ok(self.commit(applied, Origin::Local))
    }

    /// # Errors
    ///
    /// `NodeNotFound` if `id` is absent.
    pub fn delete_node(&mut self, id: &str) -> Result<Transition, GraphError> {
        let applied = applier::delete_node(self.store.current(), id)?;
        Ok(self.commit(applied, Origin::Local))
    }

    /// # Errors
    ///
    /// `SelfLoop`, `DuplicateEdge`, or `NodeNotFound`.
    pub fn connect(&mut self, from: &str, to: &str) -> Result<Transition, GraphError> {
        let applied = applier::connect(self.store.current(), from, to)?;
        Ok(self.commit(applied, Origin::Local))
    }

    /// # Errors
    ///
    /// `EdgeNotFound` or `NodeNotFound`.
    pub fn disconnect(&mut self, from: &str, to: &str) -> Result<Transition, GraphError> {
        let applied = applier::disconnect(self.store.current(), from, to)?;
        Ok(self.commit(applied, Origin::Local))
    }

    /// # Errors
    ///
    /// `NodeNotFound`, `InvalidField`, or `Unchanged`.
    pub fn update_node(&mut self, id: &str, patch: &NodePatch) -> Result<Transition, GraphError> {
        let applied = applier::update_node(self.store.current(), id, patch)?;
        Ok(self.commit(applied, Origin::Local))
    }

    // =========================================================================
    // REMOTE EDITS
    // =========================================================================

    /// Apply a peer broadcast. Recorded in history like a local edit but
    /// produces no effects.
    ///
    /// # Errors
    ///
    /// Any reason the payload was dropped; the store is unchanged.
    pub fn apply_remote(&mut self, remote: &RemoteEdit) -> Result<Transition, ReconcileError> {
        let applied = reconcile::apply_remote(self.store.current(), remote)?;
        Ok(self.commit(applied, Origin::Remote))
    }

    // =========================================================================
    // HISTORY
    // =========================================================================

    /// Step back one entry. `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<Transition> {
        self.run(HistoryCommand::Undo)
    }

    /// Step forward one entry. `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<Transition> {
        self.run(HistoryCommand::Redo)
    }

    /// Resolve a key press to undo/redo. Ignored while the canvas is inactive.
    pub fn press_key(&mut self, chord: &KeyChord) -> Option<Transition> {
        if !self.canvas_active {
            return None;
        }
        keymap::resolve(chord).and_then(|command| self.run(command))
    }

    fn run(&mut self, command: HistoryCommand) -> Option<Transition> {
        let target = match command {
            HistoryCommand::Undo => self.history.undo()?,
            HistoryCommand::Redo => self.history.redo()?,
        }
        .clone();
        let diff = self.store.current().diff(&target);
        self.store.replace_all(target);
        Some(Transition {
            origin: Origin::Local,
            edit: None,
            changed: self.records(&diff.changed),
            removed: diff.removed,
            effects: Vec::new(),
        })
    }

    // =========================================================================
    // COMMIT
    // =========================================================================

    fn commit(&mut self, applied: Applied, origin: Origin) -> Transition {
        let Applied { snapshot, edit, affected, removed } = applied;

        self.store.replace_all(snapshot.clone());
        self.history
            .record(HistoryEntry::new(edit.entry_kind(), Some(affected.clone()), snapshot));

        let (present, gone): (Vec<NodeId>, Vec<NodeId>) =
            affected.into_iter().partition(|id| self.store.get(id).is_some());
        let changed = self.records(&present);

        let effects = if origin == Origin::Local {
            let mut published: Vec<Node> = removed.into_iter().collect();
            published.extend(changed.iter().cloned());
            vec![
                Effect::Persist { room_id: self.room_id, nodes: changed.clone(), removed: gone.clone() },
                Effect::Publish { room_id: self.room_id, edit: RemoteEdit { edit, nodes: published } },
            ]
        } else {
            Vec::new()
        };

        Transition { origin, edit: Some(edit), changed, removed: gone, effects }
    }

    fn records(&self, ids: &[NodeId]) -> Vec<Node> {
        ids.iter()
            .filter_map(|id| self.store.get(id).cloned())
            .collect()
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
