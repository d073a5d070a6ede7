//! Keyboard shortcuts for history navigation.
//!
//! Ctrl+Z / Cmd+Z undoes; adding Shift, or pressing Y with the same
//! modifier, redoes. Anything else is not a history shortcut.

use serde::Deserialize;

/// A key press as reported by the canvas view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KeyChord {
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub meta: bool,
    #[serde(default)]
    pub shift: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryCommand {
    Undo,
    Redo,
}

/// Map a chord to a history command.
#[must_use]
pub fn resolve(chord: &KeyChord) -> Option<HistoryCommand> {
    if !(chord.ctrl || chord.meta) {
        return None;
    }
    match chord.key.to_ascii_lowercase().as_str() {
        "z" if chord.shift => Some(HistoryCommand::Redo),
        "z" => Some(HistoryCommand::Undo),
        "y" if !chord.shift => Some(HistoryCommand::Redo),
        _ => None,
    }
}
