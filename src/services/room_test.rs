use super::*;
use crate::frame::Status;
use crate::graph::reconcile;
use crate::graph::{EditKind, ToolConfig};
use crate::state::test_helpers;
use tokio::time::{Duration, timeout};

async fn assert_channel_has_frame(rx: &mut mpsc::Receiver<Frame>) -> Frame {
    timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("frame receive timed out")
        .expect("channel closed")
}

async fn assert_channel_empty(rx: &mut mpsc::Receiver<Frame>) {
    assert!(
        timeout(Duration::from_millis(80), rx.recv()).await.is_err(),
        "expected channel to remain empty"
    );
}

fn add_edit(id: &str) -> RemoteEdit {
    RemoteEdit { edit: EditKind::Add, nodes: vec![ToolConfig::default().node_at(id.into(), 1.0, 2.0)] }
}

#[tokio::test]
async fn join_reports_existing_peers() {
    let (state, _repo) = test_helpers::test_app_state();
    let room_id = Uuid::new_v4();
    let (tx_a, _rx_a) = mpsc::channel(4);
    let (tx_b, _rx_b) = mpsc::channel(4);

    assert_eq!(join_room(&state, room_id, Uuid::new_v4(), tx_a).await, 0);
    assert_eq!(join_room(&state, room_id, Uuid::new_v4(), tx_b).await, 1);
    assert_eq!(test_helpers::member_count(&state, room_id).await, 2);
}

#[tokio::test]
async fn leave_is_idempotent_and_evicts_empty_rooms() {
    let (state, _repo) = test_helpers::test_app_state();
    let room_id = Uuid::new_v4();
    let client_a = Uuid::new_v4();
    let client_b = Uuid::new_v4();
    let _rx_a = test_helpers::seed_client(&state, room_id, client_a).await;
    let _rx_b = test_helpers::seed_client(&state, room_id, client_b).await;

    leave_room(&state, room_id, client_a).await;
    leave_room(&state, room_id, client_a).await;
    assert_eq!(test_helpers::member_count(&state, room_id).await, 1);

    leave_room(&state, room_id, client_b).await;
    assert!(!state.rooms.read().await.contains_key(&room_id));

    leave_room(&state, room_id, client_b).await;
    leave_room(&state, Uuid::new_v4(), client_b).await;
}

#[tokio::test]
async fn publish_reaches_peers_but_not_sender() {
    let (state, _repo) = test_helpers::test_app_state();
    let room_id = Uuid::new_v4();
    let sender = Uuid::new_v4();
    let peer_a = Uuid::new_v4();
    let peer_b = Uuid::new_v4();
    let mut rx_sender = test_helpers::seed_client(&state, room_id, sender).await;
    let mut rx_a = test_helpers::seed_client(&state, room_id, peer_a).await;
    let mut rx_b = test_helpers::seed_client(&state, room_id, peer_b).await;

    let delivered = publish(&state, room_id, sender, &add_edit("n1")).await.unwrap();
    assert_eq!(delivered, 2);

    for rx in [&mut rx_a, &mut rx_b] {
        let frame = assert_channel_has_frame(rx).await;
        assert_eq!(frame.syscall, REMOTE_SYSCALL);
        assert_eq!(frame.status, Status::Request);
        assert_eq!(frame.room_id, Some(room_id));
        assert_eq!(frame.from.as_deref(), Some(sender.to_string().as_str()));
    }
    assert_channel_empty(&mut rx_sender).await;
}

#[tokio::test]
async fn published_payload_decodes_back_to_the_edit() {
    let (state, _repo) = test_helpers::test_app_state();
    let room_id = Uuid::new_v4();
    let sender = Uuid::new_v4();
    let _rx_sender = test_helpers::seed_client(&state, room_id, sender).await;
    let mut rx_peer = test_helpers::seed_client(&state, room_id, Uuid::new_v4()).await;

    let edit = add_edit("n1");
    publish(&state, room_id, sender, &edit).await.unwrap();

    let frame = assert_channel_has_frame(&mut rx_peer).await;
    let payload = serde_json::Value::Object(frame.data.into_iter().collect());
    assert_eq!(reconcile::decode(payload).unwrap(), edit);
}

#[tokio::test]
async fn publish_from_non_member_is_rejected() {
    let (state, _repo) = test_helpers::test_app_state();
    let room_id = Uuid::new_v4();
    let mut rx_peer = test_helpers::seed_client(&state, room_id, Uuid::new_v4()).await;

    let err = publish(&state, room_id, Uuid::new_v4(), &add_edit("n1")).await.unwrap_err();
    assert!(matches!(err, RoomError::NotJoined { .. }));
    assert_channel_empty(&mut rx_peer).await;

    assert!(publish(&state, Uuid::new_v4(), Uuid::new_v4(), &add_edit("n1")).await.is_err());
}

#[tokio::test]
async fn full_peer_channel_drops_only_that_peer() {
    let (state, _repo) = test_helpers::test_app_state();
    let room_id = Uuid::new_v4();
    let sender = Uuid::new_v4();
    let _rx_sender = test_helpers::seed_client(&state, room_id, sender).await;
    let mut rx_ok = test_helpers::seed_client(&state, room_id, Uuid::new_v4()).await;

    let (slow_tx, mut slow_rx) = mpsc::channel(1);
    slow_tx.try_send(Frame::request("filler", Data::new())).unwrap();
    join_room(&state, room_id, Uuid::new_v4(), slow_tx).await;

    let delivered = publish(&state, room_id, sender, &add_edit("n1")).await.unwrap();
    assert_eq!(delivered, 1);
    assert_eq!(assert_channel_has_frame(&mut rx_ok).await.syscall, REMOTE_SYSCALL);
    assert_eq!(assert_channel_has_frame(&mut slow_rx).await.syscall, "filler");
    assert_channel_empty(&mut slow_rx).await;
}
