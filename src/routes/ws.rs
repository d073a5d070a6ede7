//! WebSocket handler — one editing session per connection.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by syscall prefix
//! - Frames queued for this client (peer edits, notices) → reconcile or
//!   forward to the socket
//!
//! The connection owns its `GraphSession` outright. Every edit commits in
//! memory before the reply is built. The effects it returns go to the
//! connection's `EffectScheduler`, which publishes them inline and queues
//! writes to its single persistence worker, so peers and storage both see
//! this client's edits in the order they were made.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id`
//! 2. `room:join` → join hub, load room, open session, reply with nodes.
//!    Peer edits that arrive during the load wait in the queue and are
//!    reconciled once the session exists.
//! 3. Edits / history / keys → reply with changed records, run effects
//! 4. Peer `graph:remote` → reconcile → forward `graph:changed`
//! 5. `room:leave` or close → leave hub, drop session. On close, queued
//!    writes are flushed before the task ends.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::frame::{Data, Frame};
use crate::graph::keymap::KeyChord;
use crate::graph::reconcile;
use crate::graph::{GraphError, GraphSession, NodePatch, ShapeType, Transition};
use crate::services::effects::EffectScheduler;
use crate::services::room;
use crate::state::AppState;

/// Syscall of reconciled peer changes forwarded to the client.
pub const CHANGED_SYSCALL: &str = "graph:changed";

// =============================================================================
// CONNECTION
// =============================================================================

/// Per-connection state. Never shared outside the connection task.
pub(crate) struct Connection {
    client_id: Uuid,
    /// Outbound queue; the room hub and the effect scheduler write here.
    tx: mpsc::Sender<Frame>,
    session: Option<GraphSession>,
    effects: EffectScheduler,
}

impl Connection {
    pub(crate) fn new(state: &AppState, client_id: Uuid, tx: mpsc::Sender<Frame>) -> Self {
        let effects = EffectScheduler::spawn(state, client_id, tx.clone());
        Self { client_id, tx, session: None, effects }
    }

    pub(crate) fn room_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(GraphSession::room_id)
    }

    #[cfg(test)]
    pub(crate) fn session(&self) -> Option<&GraphSession> {
        self.session.as_ref()
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.config.client_channel_capacity);
    let mut conn = Connection::new(&state, client_id, client_tx);

    let welcome = Frame::request("session:connected", Data::new()).with_data("client_id", client_id.to_string());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%client_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        for frame in process_inbound_text(&state, &mut conn, &text).await {
                            let _ = send_frame(&mut socket, &frame).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                let Some(outbound) = process_queued_frame(&mut conn, frame) else { continue };
                if send_frame(&mut socket, &outbound).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(room_id) = conn.room_id() {
        room::leave_room(&state, room_id, client_id).await;
    }
    conn.effects.shutdown().await;
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// INBOUND
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
pub(crate) async fn process_inbound_text(state: &AppState, conn: &mut Connection, text: &str) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(client_id = %conn.client_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };
    req.from = Some(conn.client_id.to_string());
    if let Some(room_id) = conn.room_id() {
        req.room_id.get_or_insert(room_id);
    }

    debug!(client_id = %conn.client_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");

    let prefix = req.prefix();
    let reply = match prefix {
        "room" => handle_room(state, conn, &req).await,
        "node" | "edge" | "history" | "key" | "canvas" | "tool" => handle_edit(conn, &req).await,
        _ => req.error(format!("unknown prefix: {prefix}")),
    };
    vec![reply]
}

// =============================================================================
// ROOM HANDLERS
// =============================================================================

async fn handle_room(state: &AppState, conn: &mut Connection, req: &Frame) -> Frame {
    match req.op() {
        "join" => {
            let Some(room_id) = req
                .str_field("room_id")
                .and_then(|s| s.parse().ok())
                .or(req.room_id)
            else {
                return req.error("room_id required");
            };

            if let Some(old_room) = conn.room_id() {
                room::leave_room(state, old_room, conn.client_id).await;
                conn.session = None;
            }

            // Register before loading so edits published meanwhile are queued.
            let peers = room::join_room(state, room_id, conn.client_id, conn.tx.clone()).await;
            let snapshot = match state.repo.load_graph(room_id).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(%room_id, client_id = %conn.client_id, error = %e, "ws: room load failed");
                    room::leave_room(state, room_id, conn.client_id).await;
                    return req.error_from(&e);
                }
            };

            let session =
                GraphSession::open(room_id, snapshot, state.config.tool.clone(), state.config.history_limit);
            let nodes = session.snapshot().to_nodes();
            conn.session = Some(session);

            let mut data = Data::new();
            data.insert("room_id".into(), serde_json::json!(room_id));
            data.insert("nodes".into(), serde_json::to_value(&nodes).unwrap_or_default());
            data.insert("peers".into(), serde_json::json!(peers));
            req.done_with(data).with_room_id(room_id)
        }
        "leave" => {
            if let Some(room_id) = conn.room_id() {
                room::leave_room(state, room_id, conn.client_id).await;
                conn.session = None;
            }
            req.done()
        }
        op => req.error(format!("unknown room op: {op}")),
    }
}

// =============================================================================
// EDIT HANDLERS
// =============================================================================

async fn handle_edit(conn: &mut Connection, req: &Frame) -> Frame {
    let Some(session) = conn.session.as_mut() else {
        return req.error("must join a room first");
    };

    let result: Result<Option<Transition>, Frame> = match (req.prefix(), req.op()) {
        ("node", "add") => {
            let (Some(x), Some(y)) = (req.f64_field("x"), req.f64_field("y")) else {
                return req.error("x and y required");
            };
            let shape = match req.str_field("shapeType").map(str::parse::<ShapeType>) {
                None => None,
                Some(Ok(shape)) => Some(shape),
                Some(Err(e)) => return req.error(e.to_string()),
            };
            session.add_node(x, y, shape).map(Some).map_err(|e| req.error_from(&e))
        }
        ("node", "update") => {
            let Some(id) = req.str_field("id") else {
                return req.error("id required");
            };
            match patch_from(req) {
                Ok(patch) => match session.update_node(id, &patch) {
                    Ok(transition) => Ok(Some(transition)),
                    Err(GraphError::Unchanged(_)) => Ok(None),
                    Err(e) => Err(req.error_from(&e)),
                },
                Err(msg) => Err(req.error(msg)),
            }
        }
        ("node", "delete") => {
            let Some(id) = req.str_field("id") else {
                return req.error("id required");
            };
            session.delete_node(id).map(Some).map_err(|e| req.error_from(&e))
        }
        ("edge", op @ ("connect" | "disconnect")) => {
            let (Some(from), Some(to)) = (req.str_field("from"), req.str_field("to")) else {
                return req.error("from and to required");
            };
            let result: Result<Transition, GraphError> =
                if op == "connect" { session.connect(from, to) } else { session.disconnect(from, to) };
            result.map(Some).map_err(|e| req.error_from(&e))
        }
        ("history", "undo") => Ok(session.undo()),
        ("history", "redo") => Ok(session.redo()),
        ("key", "press") => {
            let payload = serde_json::Value::Object(req.data.clone().into_iter().collect());
            match serde_json::from_value::<KeyChord>(payload) {
                Ok(chord) => Ok(session.press_key(&chord)),
                Err(e) => Err(req.error(format!("invalid key chord: {e}"))),
            }
        }
        ("canvas", op @ ("focus" | "blur")) => {
            session.set_canvas_active(op == "focus");
            return req.done().with_data("active", session.canvas_active());
        }
        ("tool", "set") => {
            return match patch_from(req) {
                Ok(patch) => {
                    session.set_tool(&patch);
                    req.done().with_data("tool", serde_json::to_value(session.tool()).unwrap_or_default())
                }
                Err(msg) => req.error(msg),
            };
        }
        (prefix, op) => return req.error(format!("unknown {prefix} op: {op}")),
    };

    let reply = match result {
        Ok(Some(transition)) => {
            let data = transition_data(&transition);
            conn.effects.run(transition.effects).await;
            req.done_with(data)
        }
        Ok(None) => req.done().with_data("applied", false),
        Err(err_frame) => return err_frame,
    };
    match conn.session.as_ref() {
        Some(session) => reply
            .with_data("canUndo", session.history().can_undo())
            .with_data("canRedo", session.history().can_redo()),
        None => reply,
    }
}

fn patch_from(req: &Frame) -> Result<NodePatch, String> {
    let payload = serde_json::Value::Object(req.data.clone().into_iter().collect());
    serde_json::from_value(payload).map_err(|e| format!("invalid fields: {e}"))
}

fn transition_data(transition: &Transition) -> Data {
    let mut data = Data::new();
    data.insert("applied".into(), serde_json::json!(true));
    if let Some(edit) = transition.edit {
        data.insert("edit".into(), serde_json::json!(edit));
    }
    data.insert("nodes".into(), serde_json::to_value(&transition.changed).unwrap_or_default());
    data.insert("removed".into(), serde_json::json!(transition.removed));
    data
}

// =============================================================================
// QUEUED FRAMES
// =============================================================================

/// Turn a frame from this client's queue into what goes on the socket.
/// Peer edits are reconciled into the session and become `graph:changed`;
/// anything else (notices) is forwarded as is. Dropped edits yield `None`.
pub(crate) fn process_queued_frame(conn: &mut Connection, frame: Frame) -> Option<Frame> {
    if frame.syscall != room::REMOTE_SYSCALL {
        return Some(frame);
    }

    let client_id = conn.client_id;
    let Some(session) = conn.session.as_mut() else {
        debug!(%client_id, "ws: peer edit arrived with no open session");
        return None;
    };
    let room_id = session.room_id();
    if frame.room_id != Some(room_id) {
        debug!(%client_id, %room_id, frame_room = ?frame.room_id, "ws: peer edit for another room");
        return None;
    }

    let payload = serde_json::Value::Object(frame.data.into_iter().collect());
    let applied = reconcile::decode(payload).and_then(|remote| session.apply_remote(&remote));
    match applied {
        Ok(transition) => {
            let mut out = Frame::request(CHANGED_SYSCALL, transition_data(&transition)).with_room_id(room_id);
            out.from = frame.from;
            Some(out)
        }
        Err(e) if e.is_redundant() => {
            debug!(%client_id, %room_id, error = %e, "ws: redundant peer edit");
            None
        }
        Err(e) => {
            warn!(%client_id, %room_id, from = ?frame.from, error = %e, "ws: dropped peer edit");
            None
        }
    }
}

// =============================================================================
// SEND
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == crate::frame::Status::Error {
        let code = frame.str_field("code").unwrap_or("-");
        let message = frame.str_field("message").unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        debug!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
