#![allow(clippy::float_cmp)]

use super::*;
use crate::graph::node::ToolConfig;

fn node(id: &str) -> Node {
    ToolConfig::default().node_at(id.into(), 0.0, 0.0)
}

fn graph(ids: &[&str]) -> Snapshot {
    let mut snapshot = Snapshot::new();
    for id in ids {
        snapshot = add_node(&snapshot, node(id)).unwrap().snapshot;
    }
    snapshot
}

fn ids(list: &[&str]) -> Vec<NodeId> {
    list.iter().map(|s| (*s).to_string()).collect()
}

// =============================================================================
// ADD
// =============================================================================

#[test]
fn add_node_inserts_and_reports_new_id() {
    let applied = add_node(&Snapshot::new(), node("n1")).unwrap();
    assert_eq!(applied.edit, EditKind::Add);
    assert_eq!(applied.affected, ids(&["n1"]));
    assert!(applied.snapshot.contains("n1"));
}

#[test]
fn add_node_rejects_duplicate_id() {
    let snapshot = graph(&["n1"]);
    assert_eq!(add_node(&snapshot, node("n1")), Err(GraphError::DuplicateNode("n1".into())));
}

#[test]
fn add_node_rejects_records_with_edges() {
    let mut n = node("n1");
    n.children.push("n2".into());
    assert!(matches!(add_node(&Snapshot::new(), n), Err(GraphError::InvalidField { field: "edges", .. })));
}

#[test]
fn add_node_leaves_input_snapshot_untouched() {
    let before = graph(&["a"]);
    let applied = add_node(&before, node("b")).unwrap();
    assert_eq!(before.len(), 1);
    assert_eq!(applied.snapshot.len(), 2);
}

// =============================================================================
// EDGES
// =============================================================================

#[test]
fn connect_links_both_sides() {
    let applied = connect(&graph(&["a", "b"]), "a", "b").unwrap();
    let s = &applied.snapshot;
    assert_eq!(s.get("a").unwrap().children, ids(&["b"]));
    assert!(s.get("b").unwrap().parents.contains("a"));
    assert_eq!(applied.affected, ids(&["a", "b"]));
    assert_eq!(applied.edit, EditKind::Connect);
}

#[test]
fn connect_twice_is_rejected_and_state_is_unchanged() {
    let first = connect(&graph(&["a", "b"]), "a", "b").unwrap().snapshot;
    let second = connect(&first, "a", "b");
    assert_eq!(second, Err(GraphError::DuplicateEdge { from: "a".into(), to: "b".into() }));
    assert_eq!(first.get("a").unwrap().children, ids(&["b"]));
}

#[test]
fn connect_self_loop_is_rejected() {
    let snapshot = graph(&["a"]);
    assert_eq!(connect(&snapshot, "a", "a"), Err(GraphError::SelfLoop("a".into())));
    assert!(snapshot.get("a").unwrap().is_isolated());
}

#[test]
fn connect_unknown_node_is_rejected() {
    let snapshot = graph(&["a"]);
    assert_eq!(connect(&snapshot, "a", "zz"), Err(GraphError::NodeNotFound("zz".into())));
    assert_eq!(connect(&snapshot, "zz", "a"), Err(GraphError::NodeNotFound("zz".into())));
}

#[test]
fn connect_preserves_child_order() {
    let mut s = graph(&["a", "c", "b"]);
    s = connect(&s, "a", "c").unwrap().snapshot;
    s = connect(&s, "a", "b").unwrap().snapshot;
    assert_eq!(s.get("a").unwrap().children, ids(&["c", "b"]));
}

#[test]
fn disconnect_removes_both_sides() {
    let linked = connect(&graph(&["a", "b"]), "a", "b").unwrap().snapshot;
    let applied = disconnect(&linked, "a", "b").unwrap();
    assert!(applied.snapshot.get("a").unwrap().is_isolated());
    assert!(applied.snapshot.get("b").unwrap().is_isolated());
    assert_eq!(applied.edit, EditKind::Disconnect);
}

#[test]
fn disconnect_missing_edge_is_rejected() {
    let snapshot = graph(&["a", "b"]);
    assert_eq!(
        disconnect(&snapshot, "a", "b"),
        Err(GraphError::EdgeNotFound { from: "a".into(), to: "b".into() })
    );
    let linked = connect(&snapshot, "a", "b").unwrap().snapshot;
    assert!(disconnect(&linked, "b", "a").is_err());
}

// =============================================================================
// DELETE
// =============================================================================

#[test]
fn delete_cascades_to_all_neighbours() {
    let mut s = graph(&["p1", "p2", "x", "c1", "c2", "c3"]);
    for parent in ["p1", "p2"] {
        s = connect(&s, parent, "x").unwrap().snapshot;
    }
    for child in ["c1", "c2", "c3"] {
        s = connect(&s, "x", child).unwrap().snapshot;
    }

    let applied = delete_node(&s, "x").unwrap();
    let after = &applied.snapshot;

    assert!(!after.contains("x"));
    for id in ["p1", "p2", "c1", "c2", "c3"] {
        let n = after.get(id).unwrap();
        assert!(!n.children.iter().any(|c| c == "x"), "{id} still lists x as child");
        assert!(!n.parents.contains("x"), "{id} still lists x as parent");
    }
    assert_eq!(applied.affected, ids(&["x", "c1", "c2", "c3", "p1", "p2"]));
    assert_eq!(applied.removed.as_ref().map(|n| n.id.as_str()), Some("x"));
    assert!(after.edge_violations().is_empty());
}

#[test]
fn delete_reports_mutual_neighbour_once() {
    let mut s = graph(&["a", "b"]);
    s = connect(&s, "a", "b").unwrap().snapshot;
    s = connect(&s, "b", "a").unwrap().snapshot;
    let applied = delete_node(&s, "a").unwrap();
    assert_eq!(applied.affected, ids(&["a", "b"]));
    assert!(applied.snapshot.get("b").unwrap().is_isolated());
}

#[test]
fn delete_unknown_node_is_rejected() {
    assert_eq!(delete_node(&Snapshot::new(), "ghost"), Err(GraphError::NodeNotFound("ghost".into())));
}

// =============================================================================
// UPDATE
// =============================================================================

#[test]
fn update_changes_only_listed_fields() {
    let s = connect(&graph(&["a", "b"]), "a", "b").unwrap().snapshot;
    let patch = NodePatch { x: Some(42.0), fill_style: Some("#00FF00".into()), ..NodePatch::default() };
    let applied = update_node(&s, "a", &patch).unwrap();
    let a = applied.snapshot.get("a").unwrap();
    assert_eq!(a.x, 42.0);
    assert_eq!(a.y, 0.0);
    assert_eq!(a.fill_style, "#00FF00");
    assert_eq!(a.children, ids(&["b"]));
    assert_eq!(applied.affected, ids(&["a"]));
    assert_eq!(applied.edit.entry_kind(), EntryKind::Update);
}

#[test]
fn update_rejects_unknown_invalid_and_noop() {
    let s = graph(&["a"]);
    let patch = NodePatch { x: Some(1.0), ..NodePatch::default() };
    assert_eq!(update_node(&s, "nope", &patch), Err(GraphError::NodeNotFound("nope".into())));

    let bad = NodePatch { width: Some(-3.0), ..NodePatch::default() };
    assert!(matches!(update_node(&s, "a", &bad), Err(GraphError::InvalidField { field: "width", .. })));

    let inf = NodePatch { y: Some(f64::INFINITY), ..NodePatch::default() };
    assert!(matches!(update_node(&s, "a", &inf), Err(GraphError::InvalidField { field: "y", .. })));

    let same = NodePatch { x: Some(0.0), ..NodePatch::default() };
    assert_eq!(update_node(&s, "a", &same), Err(GraphError::Unchanged("a".into())));
}

// =============================================================================
// INVARIANT
// =============================================================================

/// Deterministic xorshift so the walk is reproducible without a rand dependency.
struct Walk(u64);

impl Walk {
    fn next(&mut self, bound: usize) -> usize {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        usize::try_from(self.0 % bound as u64).unwrap()
    }
}

#[test]
fn edge_invariant_holds_across_random_edit_sequences() {
    for seed in 1..=20_u64 {
        let mut walk = Walk(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let mut s = Snapshot::new();
        let mut next_id = 0;

        for _ in 0..200 {
            let live: Vec<NodeId> = s.to_nodes().into_iter().map(|n| n.id).collect();
            let pick = |w: &mut Walk| live[w.next(live.len())].clone();
            let result = match walk.next(4) {
                0 => {
                    next_id += 1;
                    add_node(&s, node(&format!("n{next_id}")))
                }
                1 if !live.is_empty() => delete_node(&s, &pick(&mut walk)),
                2 if !live.is_empty() => {
                    let (a, b) = (pick(&mut walk), pick(&mut walk));
                    connect(&s, &a, &b)
                }
                3 if !live.is_empty() => {
                    let (a, b) = (pick(&mut walk), pick(&mut walk));
                    disconnect(&s, &a, &b)
                }
                _ => continue,
            };
            if let Ok(applied) = result {
                s = applied.snapshot;
            }
            assert!(s.edge_violations().is_empty(), "seed {seed}: {:?}", s.edge_violations());
        }
    }
}
