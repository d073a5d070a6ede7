//! Persistence service — room documents in Postgres.
//!
//! DESIGN
//! ======
//! A room's document is one row per node in `room_nodes`, keyed by
//! `(room_id, node_id)` with the serialized record in a `jsonb` column.
//! Edges travel inside the record as id lists, so a load needs no joins.
//!
//! The `GraphRepository` trait is the seam the rest of the server talks to;
//! `PgGraphRepository` is the production implementation and tests plug in
//! in-memory doubles from `state::test_helpers`.
//!
//! ERROR HANDLING
//! ==============
//! Writes are issued once and never retried here. A failure propagates to
//! the effect scheduler, which logs it and notifies the editing client; the
//! in-memory edit stands either way. Loads skip records that do not decode
//! and repair dangling edges instead of failing the whole room.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::graph::reconcile;
use crate::graph::{Node, NodeId, Snapshot};

// =============================================================================
// TYPES
// =============================================================================

/// Postgres error code for foreign-key violations.
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("room not found: {0}")]
    RoomNotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for PersistenceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::RoomNotFound(_) => "E_ROOM_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Row returned from room queries.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RoomRow {
    pub id: Uuid,
    pub name: String,
}

// =============================================================================
// REPOSITORY
// =============================================================================

/// Storage for room documents.
#[async_trait]
pub trait GraphRepository: Send + Sync {
    /// Create an empty room.
    async fn create_room(&self, name: &str) -> Result<RoomRow, PersistenceError>;

    /// Load every node of a room. `RoomNotFound` if the room does not exist.
    async fn load_graph(&self, room_id: Uuid) -> Result<Snapshot, PersistenceError>;

    /// Upsert records by id. Writing to a missing room is `RoomNotFound`.
    async fn save_nodes(&self, room_id: Uuid, nodes: &[Node]) -> Result<(), PersistenceError>;

    /// Remove records by id. Unknown ids are ignored.
    async fn delete_nodes(&self, room_id: Uuid, ids: &[NodeId]) -> Result<(), PersistenceError>;
}

/// `GraphRepository` backed by the shared SQLx pool.
#[derive(Clone)]
pub struct PgGraphRepository {
    pool: PgPool,
}

impl PgGraphRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GraphRepository for PgGraphRepository {
    async fn create_room(&self, name: &str) -> Result<RoomRow, PersistenceError> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO rooms (id, name) VALUES ($1, $2)")
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await?;

        info!(%id, name, "created room");
        Ok(RoomRow { id, name: name.to_owned() })
    }

    async fn load_graph(&self, room_id: Uuid) -> Result<Snapshot, PersistenceError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM rooms WHERE id = $1)")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(PersistenceError::RoomNotFound(room_id));
        }

        let rows = sqlx::query_as::<_, (String, serde_json::Value)>(
            "SELECT node_id, record FROM room_nodes WHERE room_id = $1",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        let records = decode_records(room_id, rows);
        let snapshot = reconcile::snapshot_from_records(records);
        info!(%room_id, count = snapshot.len(), "loaded room graph");
        Ok(snapshot)
    }

    async fn save_nodes(&self, room_id: Uuid, nodes: &[Node]) -> Result<(), PersistenceError> {
        if nodes.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for node in nodes {
            sqlx::query(
                "INSERT INTO room_nodes (room_id, node_id, record, updated_at) \
                 VALUES ($1, $2, $3, now()) \
                 ON CONFLICT (room_id, node_id) DO UPDATE SET \
                     record = EXCLUDED.record, updated_at = now()",
            )
            .bind(room_id)
            .bind(&node.id)
            .bind(Json(node))
            .execute(&mut *tx)
            .await
            .map_err(|e| classify_write_error(room_id, e))?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_nodes(&self, room_id: Uuid, ids: &[NodeId]) -> Result<(), PersistenceError> {
        if ids.is_empty() {
            return Ok(());
        }

        sqlx::query("DELETE FROM room_nodes WHERE room_id = $1 AND node_id = ANY($2)")
            .bind(room_id)
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Decode persisted rows, skipping any whose record does not parse or whose
/// key disagrees with the record's own id.
pub(crate) fn decode_records(room_id: Uuid, rows: Vec<(String, serde_json::Value)>) -> Vec<Node> {
    rows.into_iter()
        .filter_map(|(node_id, record)| match serde_json::from_value::<Node>(record) {
            Ok(node) if node.id == node_id => Some(node),
            Ok(node) => {
                warn!(%room_id, %node_id, record_id = %node.id, "skipping persisted node with mismatched id");
                None
            }
            Err(e) => {
                warn!(%room_id, %node_id, error = %e, "skipping undecodable persisted node");
                None
            }
        })
        .collect()
}

fn classify_write_error(room_id: Uuid, err: sqlx::Error) -> PersistenceError {
    let is_fk = err
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == FOREIGN_KEY_VIOLATION);
    if is_fk { PersistenceError::RoomNotFound(room_id) } else { PersistenceError::Database(err) }
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
