#![allow(clippy::float_cmp)]

use super::*;
use crate::graph::node::ToolConfig;

fn node(id: &str) -> Node {
    ToolConfig::default().node_at(id.into(), 0.0, 0.0)
}

fn linked(parent: &str, child: &str) -> (Node, Node) {
    let mut p = node(parent);
    let mut c = node(child);
    p.children.push(child.into());
    c.parents.insert(parent.into());
    (p, c)
}

#[test]
fn get_absent_returns_none() {
    let store = GraphStore::new();
    assert!(store.get("missing").is_none());
    assert!(store.is_empty());
}

#[test]
fn set_then_get() {
    let mut store = GraphStore::new();
    store.set(node("a"));
    assert_eq!(store.get("a").map(|n| n.id.as_str()), Some("a"));
    assert_eq!(store.len(), 1);
}

#[test]
fn held_snapshot_is_not_affected_by_later_writes() {
    let mut store = GraphStore::new();
    store.set(node("a"));
    let before = store.snapshot();

    let mut moved = node("a");
    moved.x = 500.0;
    store.set(moved);
    store.set(node("b"));

    assert_eq!(before.len(), 1);
    assert_eq!(before.get("a").unwrap().x, 0.0);
    assert_eq!(store.get("a").unwrap().x, 500.0);
    assert!(!before.ptr_eq(store.current()));
}

#[test]
fn delete_returns_removed_node_and_preserves_prior_snapshot() {
    let mut store = GraphStore::new();
    store.set(node("a"));
    let before = store.snapshot();
    let removed = store.delete("a");
    assert_eq!(removed.map(|n| n.id), Some("a".to_string()));
    assert!(store.get("a").is_none());
    assert!(before.contains("a"));
    assert!(store.delete("a").is_none());
}

#[test]
fn replace_all_swaps_content() {
    let mut store = GraphStore::new();
    store.set(node("a"));
    let snapshot = Snapshot::from_nodes([node("x"), node("y")]);
    store.replace_all(snapshot.clone());
    assert!(store.get("a").is_none());
    assert_eq!(store.len(), 2);
    assert!(store.current().ptr_eq(&snapshot));
}

#[test]
fn diff_reports_changed_and_removed() {
    let old = Snapshot::from_nodes([node("a"), node("b")]);
    let mut moved = node("a");
    moved.y = 40.0;
    let new = Snapshot::from_nodes([moved, node("c")]);

    let diff = old.diff(&new);
    assert_eq!(diff.changed, vec!["a".to_string(), "c".to_string()]);
    assert_eq!(diff.removed, vec!["b".to_string()]);
    assert!(old.diff(&old.clone()).is_empty());
}

#[test]
fn edge_violations_empty_for_consistent_graph() {
    let (p, c) = linked("p", "c");
    let snapshot = Snapshot::from_nodes([p, c]);
    assert!(snapshot.edge_violations().is_empty());
    assert_eq!(snapshot.neighbours("p"), vec!["c".to_string()]);
    assert_eq!(snapshot.neighbours("c"), vec!["p".to_string()]);
}

#[test]
fn repair_edges_fixes_one_sided_and_dangling_links() {
    let mut p = node("p");
    p.children.push("c".into());
    p.children.push("ghost".into());
    let mut c = node("c");
    c.parents.insert("q".into());
    let q = node("q");
    let mut snapshot = Snapshot::from_nodes([p, c, q]);

    assert_eq!(snapshot.repair_edges(), 3);
    assert!(snapshot.edge_violations().is_empty());
    assert_eq!(snapshot.get("p").unwrap().children, vec!["c".to_string()]);
    assert!(snapshot.get("c").unwrap().parents.contains("p"));
    assert_eq!(snapshot.get("q").unwrap().children, vec!["c".to_string()]);
}

#[test]
fn to_nodes_is_sorted_by_id() {
    let snapshot = Snapshot::from_nodes([node("b"), node("a"), node("c")]);
    let ids: Vec<String> = snapshot.to_nodes().into_iter().map(|n| n.id).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}
