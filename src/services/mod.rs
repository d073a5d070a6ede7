//! Collaborator services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own persistence and fan-out so route handlers can stay
//! focused on protocol translation, and the graph engine stays free of I/O.

pub mod effects;
pub mod persistence;
pub mod room;
