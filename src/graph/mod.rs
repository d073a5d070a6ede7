//! Graph engine: node records, snapshots, history, edits, and reconciliation.
//!
//! ARCHITECTURE
//! ============
//! Everything under this module is synchronous and free of I/O. Layers,
//! leaves first:
//!
//! - `node`: records, sparse patches, tool defaults
//! - `store`: copy-on-write snapshots and the live store
//! - `history`: undo/redo log of snapshots
//! - `applier`: add/delete/connect/disconnect/update as pure transitions
//! - `reconcile`: validation and admission of peer and persisted state
//! - `keymap`: keyboard shortcuts for history
//! - `session`: one client's store + history, emitting effects for I/O

pub mod applier;
pub mod history;
pub mod keymap;
pub mod node;
pub mod reconcile;
pub mod session;
pub mod store;

pub use applier::{EditKind, GraphError};
pub use node::{Node, NodeId, NodePatch, ShapeType, ToolConfig};
pub use reconcile::{ReconcileError, RemoteEdit};
pub use session::{Effect, GraphSession, Transition};
pub use store::Snapshot;
