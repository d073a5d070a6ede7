//! Effect scheduler — runs the I/O a local edit asked for, in edit order.
//!
//! DESIGN
//! ======
//! Each connection owns one `EffectScheduler`. Effects of successive edits
//! keep the order the client made them in:
//! - Publishes run inline in the dispatching task. `room::publish` only
//!   does `try_send` under a read lock, so this never waits on a peer.
//! - Persists go through a bounded queue drained by a single worker task
//!   per connection. Writes commit one at a time, so the last local write
//!   of a node is the one left in storage.
//!
//! The edit itself has already been committed in memory before any of this
//! runs. A full write queue makes the editing client wait; writes are never
//! dropped.
//!
//! ERROR HANDLING
//! ==============
//! Failures are logged and reported to the editing client as a `notice`
//! frame on its outbound channel. Nothing is retried and nothing is rolled
//! back; the in-memory edit stands.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::frame::{ErrorCode, Frame};
use crate::graph::{Effect, Node, NodeId};
use crate::services::room;
use crate::state::AppState;

/// One queued write: upsert `nodes`, then remove `removed`.
#[derive(Debug)]
struct PersistJob {
    room_id: Uuid,
    nodes: Vec<Node>,
    removed: Vec<NodeId>,
}

#[derive(Debug, thiserror::Error)]
#[error("persistence worker stopped; write for room {0} lost")]
struct WorkerGone(Uuid);

impl ErrorCode for WorkerGone {
    fn error_code(&self) -> &'static str {
        "E_PERSIST_UNAVAILABLE"
    }
}

/// Per-connection effect runner.
pub struct EffectScheduler {
    state: AppState,
    client_id: Uuid,
    notices: mpsc::Sender<Frame>,
    persist_tx: mpsc::Sender<PersistJob>,
    worker: JoinHandle<()>,
}

impl EffectScheduler {
    /// Start the connection's persistence worker. Failure notices go to
    /// `notices`, normally the connection's own outbound queue.
    #[must_use]
    pub fn spawn(state: &AppState, client_id: Uuid, notices: mpsc::Sender<Frame>) -> Self {
        let (persist_tx, mut rx) = mpsc::channel::<PersistJob>(state.config.persist_queue_capacity);

        let worker_state = state.clone();
        let worker_notices = notices.clone();
        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                persist(&worker_state, client_id, &worker_notices, job).await;
            }
            debug!(%client_id, "persistence worker drained");
        });

        Self { state: state.clone(), client_id, notices, persist_tx, worker }
    }

    /// Run the effects of one committed edit. Publishes complete before
    /// this returns; persists are queued behind earlier writes.
    pub async fn run(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Publish { room_id, edit } => {
                    if let Err(e) = room::publish(&self.state, room_id, self.client_id, &edit).await {
                        warn!(%room_id, client_id = %self.client_id, error = %e, "publish failed");
                        notify(&self.notices, room_id, "warn", &e);
                    }
                }
                Effect::Persist { room_id, nodes, removed } => {
                    let job = PersistJob { room_id, nodes, removed };
                    if self.persist_tx.send(job).await.is_err() {
                        let e = WorkerGone(room_id);
                        error!(%room_id, client_id = %self.client_id, error = %e, "persist enqueue failed");
                        notify(&self.notices, room_id, "error", &e);
                    }
                }
            }
        }
    }

    /// Close the write queue and wait until every queued write has been
    /// attempted.
    pub async fn shutdown(self) {
        let Self { client_id, persist_tx, worker, .. } = self;
        drop(persist_tx);
        if let Err(e) = worker.await {
            error!(%client_id, error = %e, "persistence worker panicked");
        }
    }
}

async fn persist(state: &AppState, client_id: Uuid, notices: &mpsc::Sender<Frame>, job: PersistJob) {
    let PersistJob { room_id, nodes, removed } = job;
    let result = match state.repo.save_nodes(room_id, &nodes).await {
        Ok(()) => state.repo.delete_nodes(room_id, &removed).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        error!(%room_id, %client_id, error = %e, saved = nodes.len(), removed = removed.len(), "persist failed");
        notify(notices, room_id, "error", &e);
    }
}

fn notify(notices: &mpsc::Sender<Frame>, room_id: Uuid, level: &str, err: &(impl ErrorCode + ?Sized)) {
    let frame = Frame::notice(level, err).with_room_id(room_id);
    if notices.try_send(frame).is_err() {
        warn!(%room_id, code = err.error_code(), "notice dropped; client channel unavailable");
    }
}

#[cfg(test)]
#[path = "effects_test.rs"]
mod tests;
