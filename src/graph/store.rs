//! Graph snapshots and the live graph store.
//!
//! DESIGN
//! ======
//! A `Snapshot` is an `Arc`-shared id → node map. Writers go through
//! `Arc::make_mut`, so a map that is also held by the history log (or by any
//! other reader) is cloned before it is touched. Readers holding an older
//! snapshot therefore never observe later edits, and unshared maps are edited
//! in place.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::node::{Node, NodeId};

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Full canvas state at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    nodes: Arc<HashMap<NodeId, Node>>,
}

/// Ids that differ between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Present in the newer snapshot and new or different there.
    pub changed: Vec<NodeId>,
    /// Present only in the older snapshot.
    pub removed: Vec<NodeId>,
}

impl SnapshotDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }
}

/// One broken half-edge found by [`Snapshot::edge_violations`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeViolation {
    /// `node` points at an id that is not in the snapshot.
    Dangling { node: NodeId, missing: NodeId },
    /// `parent.children` contains `child` but `child.parents` lacks `parent`.
    MissingParent { parent: NodeId, child: NodeId },
    /// `child.parents` contains `parent` but `parent.children` lacks `child`.
    MissingChild { parent: NodeId, child: NodeId },
}

impl Snapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from records. Later records win on duplicate ids.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let map = nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        Self { nodes: Arc::new(map) }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Owned records sorted by id, for stable wire and storage output.
    #[must_use]
    pub fn to_nodes(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// True if both snapshots share the same underlying map.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.nodes, &other.nodes)
    }

    /// Mutable access to the map, cloning it first if it is shared.
    pub(crate) fn nodes_mut(&mut self) -> &mut HashMap<NodeId, Node> {
        Arc::make_mut(&mut self.nodes)
    }

    /// Compare against a newer snapshot.
    #[must_use]
    pub fn diff(&self, newer: &Snapshot) -> SnapshotDiff {
        if self.ptr_eq(newer) {
            return SnapshotDiff::default();
        }
        let mut changed: Vec<NodeId> = newer
            .iter()
            .filter(|n| self.get(&n.id) != Some(*n))
            .map(|n| n.id.clone())
            .collect();
        let mut removed: Vec<NodeId> = self
            .nodes
            .keys()
            .filter(|id| !newer.contains(id))
            .cloned()
            .collect();
        changed.sort();
        removed.sort();
        SnapshotDiff { changed, removed }
    }

    /// Every place where the bidirectional edge invariant does not hold.
    #[must_use]
    pub fn edge_violations(&self) -> Vec<EdgeViolation> {
        let mut out = Vec::new();
        for node in self.nodes.values() {
            for child in &node.children {
                match self.nodes.get(child) {
                    None => out.push(EdgeViolation::Dangling { node: node.id.clone(), missing: child.clone() }),
                    Some(c) if !c.parents.contains(&node.id) => {
                        out.push(EdgeViolation::MissingParent { parent: node.id.clone(), child: child.clone() });
                    }
                    Some(_) => {}
                }
            }
            for parent in &node.parents {
                match self.nodes.get(parent) {
                    None => out.push(EdgeViolation::Dangling { node: node.id.clone(), missing: parent.clone() }),
                    Some(p) if !p.children.contains(&node.id) => {
                        out.push(EdgeViolation::MissingChild { parent: parent.clone(), child: node.id.clone() });
                    }
                    Some(_) => {}
                }
            }
        }
        out
    }

    /// Restore the edge invariant: drop dangling references and add the
    /// missing half of one-sided edges. Returns the number of fixes made.
    pub fn repair_edges(&mut self) -> usize {
        let violations = self.edge_violations();
        if violations.is_empty() {
            return 0;
        }
        let nodes = self.nodes_mut();
        for violation in &violations {
            match violation {
                EdgeViolation::Dangling { node, missing } => {
                    if let Some(n) = nodes.get_mut(node) {
                        n.children.retain(|c| c != missing);
                        n.parents.remove(missing);
                    }
                }
                EdgeViolation::MissingParent { parent, child } => {
                    if let Some(c) = nodes.get_mut(child) {
                        c.parents.insert(parent.clone());
                    }
                }
                EdgeViolation::MissingChild { parent, child } => {
                    if let Some(p) = nodes.get_mut(parent) {
                        if !p.children.contains(child) {
                            p.children.push(child.clone());
                        }
                    }
                }
            }
        }
        violations.len()
    }

    /// Ids of every node adjacent to `id`, children first, without repeats.
    #[must_use]
    pub fn neighbours(&self, id: &str) -> Vec<NodeId> {
        let Some(node) = self.get(id) else {
            return Vec::new();
        };
        let mut seen = BTreeSet::new();
        node.children
            .iter()
            .chain(node.parents.iter())
            .filter(|n| seen.insert(n.as_str()))
            .cloned()
            .collect()
    }
}

// =============================================================================
// GRAPH STORE
// =============================================================================

/// The single live copy of the canvas for one session.
#[derive(Debug, Default)]
pub struct GraphStore {
    current: Snapshot,
}

impl GraphStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.current.get(id)
    }

    /// Insert or replace a node by its id.
    pub fn set(&mut self, node: Node) {
        self.current.nodes_mut().insert(node.id.clone(), node);
    }

    /// Remove a node, returning it if it was present. Edges are not touched;
    /// cascading unlinks are the applier's job.
    pub fn delete(&mut self, id: &str) -> Option<Node> {
        if !self.current.contains(id) {
            return None;
        }
        self.current.nodes_mut().remove(id)
    }

    /// Replace the whole content with `snapshot`.
    pub fn replace_all(&mut self, snapshot: Snapshot) {
        self.current = snapshot;
    }

    /// Cheap handle to the current state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.current.clone()
    }

    #[must_use]
    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.current.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
