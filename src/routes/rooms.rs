//! Room lifecycle routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::graph::Node;
use crate::services::persistence::{PersistenceError, RoomRow};
use crate::state::AppState;

const DEFAULT_ROOM_NAME: &str = "Untitled Room";

#[derive(Deserialize)]
pub struct CreateRoomBody {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize)]
pub struct RoomGraphResponse {
    pub id: Uuid,
    pub nodes: Vec<Node>,
}

/// `POST /api/rooms` — create an empty room.
pub async fn create_room(
    State(state): State<AppState>,
    Json(body): Json<CreateRoomBody>,
) -> Result<(StatusCode, Json<RoomRow>), StatusCode> {
    let name = body
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_ROOM_NAME);

    let row = state.repo.create_room(name).await.map_err(persistence_error_to_status)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/rooms/:id` — the room's persisted graph.
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<RoomGraphResponse>, StatusCode> {
    let snapshot = state.repo.load_graph(room_id).await.map_err(persistence_error_to_status)?;
    Ok(Json(RoomGraphResponse { id: room_id, nodes: snapshot.to_nodes() }))
}

pub(crate) fn persistence_error_to_status(err: PersistenceError) -> StatusCode {
    match err {
        PersistenceError::RoomNotFound(_) => StatusCode::NOT_FOUND,
        PersistenceError::Database(e) => {
            tracing::error!(error = %e, "room route database error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
#[path = "rooms_test.rs"]
mod tests;
