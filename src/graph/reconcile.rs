//! Admission of external state: persisted loads and peer broadcasts.
//!
//! DESIGN
//! ======
//! Inbound payloads arrive as untyped JSON. They are decoded into a tagged
//! `RemoteEdit`, every record is validated, and only then is the edit run
//! through the same applier functions local edits use. Each step works on a
//! private copy of the snapshot, so a payload that fails half way is dropped
//! whole and the caller's snapshot is never partially updated.
//!
//! Payload shapes by tag:
//! - `add`: the new records (no edges). An id that already exists locally is
//!   treated as a repeated delivery and overwrites content only.
//! - `update`: full records; content fields replace the local record
//!   (last writer wins), local edges are kept.
//! - `delete`: the removed record first, then its former neighbours.
//! - `connect` / `disconnect`: exactly `[from, to]`.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::applier::{self, Applied, EditKind, GraphError};
use super::node::{InvalidNode, Node, NodeId, NodePatch};
use super::store::Snapshot;

/// Peer edit as carried on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEdit {
    pub edit: EditKind,
    pub nodes: Vec<Node>,
}

/// Why an inbound payload was dropped.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("{edit} payload carries no records")]
    Empty { edit: EditKind },
    #[error("{edit} payload needs {expected} records, got {actual}")]
    Arity { edit: EditKind, expected: usize, actual: usize },
    #[error("invalid record: {0}")]
    InvalidNode(#[from] InvalidNode),
    #[error("added node {0} arrives with edges")]
    AddWithEdges(NodeId),
    #[error(transparent)]
    Structural(#[from] GraphError),
}

impl ReconcileError {
    /// True for drops that only mean "already applied", such as a repeated
    /// delivery of the same update or of a connect the receiver already has.
    #[must_use]
    pub fn is_redundant(&self) -> bool {
        matches!(self, Self::Structural(GraphError::Unchanged(_) | GraphError::DuplicateEdge { .. }))
    }
}

impl crate::frame::ErrorCode for ReconcileError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "E_MALFORMED",
            Self::Empty { .. } | Self::Arity { .. } => "E_BAD_ARITY",
            Self::InvalidNode(_) | Self::AddWithEdges(_) => "E_INVALID_NODE",
            Self::Structural(e) => crate::frame::ErrorCode::error_code(e),
        }
    }
}

// =============================================================================
// DECODE
// =============================================================================

/// Decode and validate a broadcast payload of the form
/// `{"edit": "...", "nodes": [...]}`.
///
/// # Errors
///
/// `Malformed` for shape errors, `InvalidNode` for bad records, or an arity
/// error for the tag.
pub fn decode(payload: serde_json::Value) -> Result<RemoteEdit, ReconcileError> {
    let edit: RemoteEdit = serde_json::from_value(payload)?;
    for node in &edit.nodes {
        node.validate()?;
    }
    match edit.edit {
        EditKind::Connect | EditKind::Disconnect if edit.nodes.len() != 2 => {
            return Err(ReconcileError::Arity { edit: edit.edit, expected: 2, actual: edit.nodes.len() });
        }
        kind if edit.nodes.is_empty() => return Err(ReconcileError::Empty { edit: kind }),
        _ => {}
    }
    Ok(edit)
}

// =============================================================================
// APPLY
// =============================================================================

/// Apply a decoded peer edit to `snapshot`.
///
/// # Errors
///
/// Any structural refusal. The input snapshot is never modified.
pub fn apply_remote(snapshot: &Snapshot, remote: &RemoteEdit) -> Result<Applied, ReconcileError> {
    match remote.edit {
        EditKind::Add => apply_add(snapshot, &remote.nodes),
        EditKind::Update => apply_update(snapshot, &remote.nodes),
        EditKind::Delete => {
            let target = remote.nodes.first().ok_or(ReconcileError::Empty { edit: EditKind::Delete })?;
            Ok(applier::delete_node(snapshot, &target.id)?)
        }
        EditKind::Connect | EditKind::Disconnect => {
            let [from, to] = remote.nodes.as_slice() else {
                return Err(ReconcileError::Arity { edit: remote.edit, expected: 2, actual: remote.nodes.len() });
            };
            let applied = if remote.edit == EditKind::Connect {
                applier::connect(snapshot, &from.id, &to.id)?
            } else {
                applier::disconnect(snapshot, &from.id, &to.id)?
            };
            Ok(applied)
        }
    }
}

fn apply_add(snapshot: &Snapshot, nodes: &[Node]) -> Result<Applied, ReconcileError> {
    let mut working = snapshot.clone();
    let mut affected = Vec::new();
    for node in nodes {
        let step = if working.contains(&node.id) {
            applier::update_node(&working, &node.id, &NodePatch::from_node(node))
        } else {
            if !node.is_isolated() {
                return Err(ReconcileError::AddWithEdges(node.id.clone()));
            }
            applier::add_node(&working, node.clone())
        };
        match step {
            Ok(applied) => {
                working = applied.snapshot;
                affected.push(node.id.clone());
            }
            Err(GraphError::Unchanged(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }
    finish(working, EditKind::Add, affected, nodes)
}

fn apply_update(snapshot: &Snapshot, nodes: &[Node]) -> Result<Applied, ReconcileError> {
    let mut working = snapshot.clone();
    let mut affected = Vec::new();
    for node in nodes {
        match applier::update_node(&working, &node.id, &NodePatch::from_node(node)) {
            Ok(applied) => {
                working = applied.snapshot;
                affected.push(node.id.clone());
            }
            Err(GraphError::Unchanged(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }
    finish(working, EditKind::Update, affected, nodes)
}

fn finish(snapshot: Snapshot, edit: EditKind, affected: Vec<NodeId>, nodes: &[Node]) -> Result<Applied, ReconcileError> {
    if affected.is_empty() {
        let id = nodes.first().map(|n| n.id.clone()).unwrap_or_default();
        return Err(GraphError::Unchanged(id).into());
    }
    Ok(Applied { snapshot, edit, affected, removed: None })
}

// =============================================================================
// LOAD
// =============================================================================

/// Build a snapshot from persisted records. Invalid records are skipped and
/// broken edges repaired, each with a warning, so that the loaded graph
/// always satisfies the edge invariant.
#[must_use]
pub fn snapshot_from_records(records: Vec<Node>) -> Snapshot {
    let valid = records.into_iter().filter(|node| match node.validate() {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "skipping invalid persisted node");
            false
        }
    });
    let mut snapshot = Snapshot::from_nodes(valid);
    let repaired = snapshot.repair_edges();
    if repaired > 0 {
        warn!(repaired, "repaired inconsistent edges in persisted graph");
    }
    snapshot
}

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod tests;
