//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the graph repository, the configuration, and the room hub: a
//! map of live rooms to the outbound channels of their connected clients.
//!
//! Graph state itself is not here. Each connection owns its own
//! `GraphSession`; rooms only fan peer edits out between those sessions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::Config;
use crate::frame::Frame;
use crate::services::persistence::GraphRepository;

// =============================================================================
// ROOM STATE
// =============================================================================

/// Live membership of one room.
pub struct RoomState {
    /// Connected clients: `client_id` -> sender for outgoing frames.
    pub clients: HashMap<Uuid, mpsc::Sender<Frame>>,
}

impl RoomState {
    #[must_use]
    pub fn new() -> Self {
        Self { clients: HashMap::new() }
    }
}

impl Default for RoomState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn GraphRepository>,
    pub rooms: Arc<RwLock<HashMap<Uuid, RoomState>>>,
    pub config: Arc<Config>,
}

impl AppState {
    #[must_use]
    pub fn new(repo: Arc<dyn GraphRepository>, config: Config) -> Self {
        Self { repo, rooms: Arc::new(RwLock::new(HashMap::new())), config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
