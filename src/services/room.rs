//! Room hub — membership and peer fan-out.
//!
//! DESIGN
//! ======
//! A room exists in memory while at least one client is joined. Joining
//! registers the client's outbound channel; leaving removes it and evicts
//! the room when it empties. Both are idempotent.
//!
//! Publishing wraps a `RemoteEdit` in a `graph:remote` frame and hands a
//! copy to every other member with `try_send`. Delivery is best-effort: a
//! full or closed channel loses that frame for that peer only, with a
//! warning, and never blocks the publisher.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::frame::{Data, Frame};
use crate::graph::RemoteEdit;
use crate::state::{AppState, RoomState};

/// Syscall of peer edit broadcasts.
pub const REMOTE_SYSCALL: &str = "graph:remote";

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("client {client_id} has not joined room {room_id}")]
    NotJoined { room_id: Uuid, client_id: Uuid },
}

impl crate::frame::ErrorCode for RoomError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotJoined { .. } => "E_NOT_JOINED",
        }
    }
}

// =============================================================================
// JOIN / LEAVE
// =============================================================================

/// Register `client_id` in a room. Returns the number of other members.
pub async fn join_room(state: &AppState, room_id: Uuid, client_id: Uuid, tx: mpsc::Sender<Frame>) -> usize {
    let mut rooms = state.rooms.write().await;
    let room = rooms.entry(room_id).or_insert_with(RoomState::new);
    room.clients.insert(client_id, tx);
    let peers = room.clients.len() - 1;
    info!(%room_id, %client_id, clients = room.clients.len(), "client joined room");
    peers
}

/// Remove `client_id` from a room, evicting the room when it empties.
/// Leaving a room the client is not in is a no-op.
pub async fn leave_room(state: &AppState, room_id: Uuid, client_id: Uuid) {
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(&room_id) else {
        return;
    };
    if room.clients.remove(&client_id).is_none() {
        return;
    }
    info!(%room_id, %client_id, remaining = room.clients.len(), "client left room");

    if room.clients.is_empty() {
        rooms.remove(&room_id);
        info!(%room_id, "evicted room from memory");
    }
}

// =============================================================================
// PUBLISH
// =============================================================================

/// Wrap a peer edit in its wire frame.
#[must_use]
pub fn remote_frame(room_id: Uuid, from: Uuid, remote: &RemoteEdit) -> Frame {
    let mut data = Data::new();
    data.insert("edit".into(), serde_json::json!(remote.edit));
    data.insert("nodes".into(), serde_json::to_value(&remote.nodes).unwrap_or_default());
    Frame::request(REMOTE_SYSCALL, data)
        .with_room_id(room_id)
        .with_from(from.to_string())
}

/// Send `remote` to every member of the room except `from`. Returns how many
/// peers accepted the frame.
///
/// # Errors
///
/// `NotJoined` if `from` is not a member of the room.
pub async fn publish(state: &AppState, room_id: Uuid, from: Uuid, remote: &RemoteEdit) -> Result<usize, RoomError> {
    let rooms = state.rooms.read().await;
    let room = rooms
        .get(&room_id)
        .filter(|room| room.clients.contains_key(&from))
        .ok_or(RoomError::NotJoined { room_id, client_id: from })?;

    let frame = remote_frame(room_id, from, remote);
    let mut delivered = 0;
    for (client_id, tx) in &room.clients {
        if *client_id == from {
            continue;
        }
        match tx.try_send(frame.clone()) {
            Ok(()) => delivered += 1,
            Err(e) => warn!(%room_id, %client_id, error = %e, "dropped peer broadcast"),
        }
    }
    debug!(%room_id, %from, edit = %remote.edit, delivered, "published edit");
    Ok(delivered)
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
