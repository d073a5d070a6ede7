use super::*;
use crate::graph::node::{Node, ToolConfig};

fn node(id: &str) -> Node {
    ToolConfig::default().node_at(id.into(), 0.0, 0.0)
}

fn snap(ids: &[&str]) -> Snapshot {
    Snapshot::from_nodes(ids.iter().map(|id| node(id)))
}

fn add_entry(ids: &[&str]) -> HistoryEntry {
    let last = ids.last().map(|s| vec![(*s).to_string()]);
    HistoryEntry::new(EntryKind::Add, last, snap(ids))
}

#[test]
fn empty_history_has_nothing_to_undo_or_redo() {
    let mut history = History::new();
    assert!(history.undo().is_none());
    assert!(history.redo().is_none());
    assert!(history.is_empty());
}

#[test]
fn seed_resets_to_single_entry() {
    let mut history = History::new();
    history.record(add_entry(&["a"]));
    history.record(add_entry(&["a", "b"]));
    history.seed(snap(&["x", "y", "z"]));

    assert_eq!(history.len(), 1);
    assert_eq!(history.cursor(), 0);
    assert_eq!(history.entries()[history.cursor()].kind, EntryKind::Update);
    assert!(history.entries()[history.cursor()].diff.is_none());
    assert!(history.undo().is_none());
}

#[test]
fn undo_and_redo_walk_the_cursor() {
    let mut history = History::new();
    history.seed(Snapshot::new());
    history.record(add_entry(&["a"]));
    history.record(add_entry(&["a", "b"]));

    assert_eq!(history.undo().map(Snapshot::len), Some(1));
    assert_eq!(history.undo().map(Snapshot::len), Some(0));
    assert!(history.undo().is_none());
    assert_eq!(history.cursor(), 0);

    assert_eq!(history.redo().map(Snapshot::len), Some(1));
    assert_eq!(history.redo().map(Snapshot::len), Some(2));
    assert!(history.redo().is_none());
    assert_eq!(history.cursor(), 2);
}

#[test]
fn record_after_undo_discards_redo_tail() {
    let mut history = History::new();
    history.seed(Snapshot::new());
    history.record(add_entry(&["a"]));
    history.record(add_entry(&["a", "b"]));
    history.record(add_entry(&["a", "b", "c"]));

    history.undo();
    history.undo();
    history.record(add_entry(&["a", "z"]));

    assert!(history.redo().is_none());
    assert!(!history.can_redo());
    assert_eq!(history.len(), 3);
    assert!(history.entries()[history.cursor()].nodes.contains("z"));
}

#[test]
fn limit_drops_oldest_entries() {
    let mut history = History::with_limit(2);
    history.seed(Snapshot::new());
    history.record(add_entry(&["a"]));
    history.record(add_entry(&["a", "b"]));

    assert_eq!(history.len(), 2);
    assert_eq!(history.cursor(), 1);
    assert_eq!(history.undo().map(Snapshot::len), Some(1));
    assert!(history.undo().is_none());
}
