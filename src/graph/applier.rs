//! Graph edits as pure snapshot transitions.
//!
//! DESIGN
//! ======
//! Every operation takes the current snapshot and returns either an
//! `Applied` (the next snapshot plus the ids it touched) or a `GraphError`
//! describing why the edit was refused. Nothing here records history or
//! talks to collaborators; the session does that with the result. Refused
//! edits leave the input snapshot untouched.

use super::history::EntryKind;
use super::node::{Node, NodeId, NodePatch};
use super::store::Snapshot;

// =============================================================================
// TYPES
// =============================================================================

/// Edit tag carried on history entries and peer broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditKind {
    Add,
    Update,
    Delete,
    Connect,
    Disconnect,
}

impl EditKind {
    /// History bucket for this edit. Edge changes are updates.
    #[must_use]
    pub fn entry_kind(self) -> EntryKind {
        match self {
            Self::Add => EntryKind::Add,
            Self::Delete => EntryKind::Delete,
            Self::Update | Self::Connect | Self::Disconnect => EntryKind::Update,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
        }
    }
}

impl std::fmt::Display for EditKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful edit.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub snapshot: Snapshot,
    pub edit: EditKind,
    /// Touched ids, primary node first.
    pub affected: Vec<NodeId>,
    /// The record as it was before removal, for deletes.
    pub removed: Option<Node>,
}

/// Structural refusal. The snapshot is unchanged when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("node already exists: {0}")]
    DuplicateNode(NodeId),
    #[error("cannot connect node {0} to itself")]
    SelfLoop(NodeId),
    #[error("edge already exists: {from} -> {to}")]
    DuplicateEdge { from: NodeId, to: NodeId },
    #[error("edge not found: {from} -> {to}")]
    EdgeNotFound { from: NodeId, to: NodeId },
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("update changes nothing on node {0}")]
    Unchanged(NodeId),
}

impl crate::frame::ErrorCode for GraphError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NodeNotFound(_) => "E_NODE_NOT_FOUND",
            Self::DuplicateNode(_) => "E_DUPLICATE_NODE",
            Self::SelfLoop(_) => "E_SELF_LOOP",
            Self::DuplicateEdge { .. } => "E_DUPLICATE_EDGE",
            Self::EdgeNotFound { .. } => "E_EDGE_NOT_FOUND",
            Self::InvalidField { .. } => "E_INVALID_FIELD",
            Self::Unchanged(_) => "E_UNCHANGED",
        }
    }
}

// =============================================================================
// ADD / DELETE
// =============================================================================

/// Insert a new isolated node.
///
/// # Errors
///
/// `DuplicateNode` if the id is taken; `InvalidField` if the record is
/// malformed or already carries edges.
pub fn add_node(snapshot: &Snapshot, node: Node) -> Result<Applied, GraphError> {
    node.validate()
        .map_err(|e| GraphError::InvalidField { field: "node", reason: e.to_string() })?;
    if !node.is_isolated() {
        return Err(GraphError::InvalidField { field: "edges", reason: "new nodes start without edges".into() });
    }
    if snapshot.contains(&node.id) {
        return Err(GraphError::DuplicateNode(node.id));
    }

    let id = node.id.clone();
    let mut next = snapshot.clone();
    next.nodes_mut().insert(id.clone(), node);
    Ok(Applied { snapshot: next, edit: EditKind::Add, affected: vec![id], removed: None })
}

/// Remove a node and unlink it from every neighbour.
///
/// # Errors
///
/// `NodeNotFound` if the id is absent.
pub fn delete_node(snapshot: &Snapshot, id: &str) -> Result<Applied, GraphError> {
    let Some(target) = snapshot.get(id).cloned() else {
        return Err(GraphError::NodeNotFound(id.to_owned()));
    };

    let mut affected = vec![target.id.clone()];
    affected.extend(snapshot.neighbours(id));

    let mut next = snapshot.clone();
    let nodes = next.nodes_mut();
    nodes.remove(id);
    for child in &target.children {
        if let Some(c) = nodes.get_mut(child) {
            c.parents.remove(id);
        }
    }
    for parent in &target.parents {
        if let Some(p) = nodes.get_mut(parent) {
            p.children.retain(|c| c != id);
        }
    }

    Ok(Applied { snapshot: next, edit: EditKind::Delete, affected, removed: Some(target) })
}

// =============================================================================
// EDGES
// =============================================================================

/// Add the edge `from -> to`.
///
/// # Errors
///
/// `SelfLoop`, `NodeNotFound` for either end, or `DuplicateEdge`.
pub fn connect(snapshot: &Snapshot, from: &str, to: &str) -> Result<Applied, GraphError> {
    if from == to {
        return Err(GraphError::SelfLoop(from.to_owned()));
    }
    let source = snapshot
        .get(from)
        .ok_or_else(|| GraphError::NodeNotFound(from.to_owned()))?;
    if !snapshot.contains(to) {
        return Err(GraphError::NodeNotFound(to.to_owned()));
    }
    if source.children.iter().any(|c| c == to) {
        return Err(GraphError::DuplicateEdge { from: from.to_owned(), to: to.to_owned() });
    }

    let mut next = snapshot.clone();
    let nodes = next.nodes_mut();
    if let Some(a) = nodes.get_mut(from) {
        a.children.push(to.to_owned());
    }
    if let Some(b) = nodes.get_mut(to) {
        b.parents.insert(from.to_owned());
    }
    Ok(Applied {
        snapshot: next,
        edit: EditKind::Connect,
        affected: vec![from.to_owned(), to.to_owned()],
        removed: None,
    })
}

/// Remove the edge `from -> to`.
///
/// # Errors
///
/// `NodeNotFound` for either end, or `EdgeNotFound`.
pub fn disconnect(snapshot: &Snapshot, from: &str, to: &str) -> Result<Applied, GraphError> {
    let source = snapshot
        .get(from)
        .ok_or_else(|| GraphError::NodeNotFound(from.to_owned()))?;
    if !snapshot.contains(to) {
        return Err(GraphError::NodeNotFound(to.to_owned()));
    }
    if !source.children.iter().any(|c| c == to) {
        return Err(GraphError::EdgeNotFound { from: from.to_owned(), to: to.to_owned() });
    }

    let mut next = snapshot.clone();
    let nodes = next.nodes_mut();
    if let Some(a) = nodes.get_mut(from) {
        a.children.retain(|c| c != to);
    }
    if let Some(b) = nodes.get_mut(to) {
        b.parents.remove(from);
    }
    Ok(Applied {
        snapshot: next,
        edit: EditKind::Disconnect,
        affected: vec![from.to_owned(), to.to_owned()],
        removed: None,
    })
}

// =============================================================================
// UPDATE
// =============================================================================

/// Overwrite the fields present in `patch`. Edges are never touched.
///
/// # Errors
///
/// `NodeNotFound`, `InvalidField` for non-finite or negative geometry, or
/// `Unchanged` if the patch leaves the node as it was.
pub fn update_node(snapshot: &Snapshot, id: &str, patch: &NodePatch) -> Result<Applied, GraphError> {
    let Some(current) = snapshot.get(id) else {
        return Err(GraphError::NodeNotFound(id.to_owned()));
    };
    check_patch(patch)?;

    let mut updated = current.clone();
    if !patch.apply(&mut updated) {
        return Err(GraphError::Unchanged(id.to_owned()));
    }

    let mut next = snapshot.clone();
    next.nodes_mut().insert(id.to_owned(), updated);
    Ok(Applied { snapshot: next, edit: EditKind::Update, affected: vec![id.to_owned()], removed: None })
}

fn check_patch(patch: &NodePatch) -> Result<(), GraphError> {
    for (field, value) in [("x", patch.x), ("y", patch.y), ("width", patch.width), ("height", patch.height)] {
        let Some(value) = value else { continue };
        if !value.is_finite() {
            return Err(GraphError::InvalidField { field, reason: "must be a finite number".into() });
        }
    }
    for (field, value) in [("width", patch.width), ("height", patch.height)] {
        if value.is_some_and(|v| v < 0.0) {
            return Err(GraphError::InvalidField { field, reason: "must not be negative".into() });
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "applier_test.rs"]
mod tests;
