//! Orchestrator scenarios: group fan-out, membership enforcement,
//! idempotency policy, and the send-to-self boundary.

mod common;

use std::sync::Arc;

use chat_gateway::domain::{ChatMessage, ChatType, PresenceDirectory};
use chat_gateway::gateway::ClientSession;
use chat_gateway::shared::AppError;

use common::{StaticMembership, TestFleet};

fn frame(payload: &[u8]) -> ChatMessage {
    serde_json::from_slice(payload).expect("payload should be a wire frame")
}

#[tokio::test]
async fn group_fan_out_skips_sender() {
    let fleet = TestFleet::new();
    let membership = Arc::new(StaticMembership::new(&[(
        "42",
        &["alice", "bob", "carol"][..],
    )]));
    let gw1 = fleet.gateway("gw-1", membership);

    let (alice, mut alice_rx) = ClientSession::new("alice", "gw-1", 16);
    let (bob, mut bob_rx) = ClientSession::new("bob", "gw-1", 16);
    let (carol, mut carol_rx) = ClientSession::new("carol", "gw-1", 16);
    gw1.manager.add(Arc::new(alice));
    gw1.manager.add(Arc::new(bob));
    gw1.manager.add(Arc::new(carol));
    for user in ["alice", "bob", "carol"] {
        fleet.presence.register(user, "gw-1").await.unwrap();
    }

    gw1.orchestrator
        .send_group("alice", "42", "hello", "")
        .await
        .unwrap();

    // bob and carol each receive exactly one frame carrying the group id
    for rx in [&mut bob_rx, &mut carol_rx] {
        let received = frame(&rx.try_recv().expect("member should receive a frame"));
        assert_eq!(received.chat_type, ChatType::Group);
        assert_eq!(received.from, "alice");
        assert_eq!(received.to, "42");
        assert_eq!(received.content, "hello");
        assert!(rx.try_recv().is_err());
    }
    // the sender gets no echo from the orchestrator
    assert!(alice_rx.try_recv().is_err());

    // persisted once, under the group conversation
    let saved = fleet.store.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].conversation_id, "group:42");
}

#[tokio::test]
async fn non_member_is_rejected_before_persistence() {
    let fleet = TestFleet::new();
    let membership = Arc::new(StaticMembership::new(&[("42", &["bob", "carol"][..])]));
    let gw1 = fleet.gateway("gw-1", membership);

    let result = gw1.orchestrator.send_group("mallory", "42", "hi", "").await;

    assert!(matches!(result, Err(AppError::NotAuthorized(_))));
    assert!(fleet.store.saved().is_empty());
    assert_eq!(fleet.transport.total_produced(), 0);
}

#[tokio::test]
async fn empty_group_persists_without_fan_out() {
    let fleet = TestFleet::new();
    // alice is the only member; membership passes, nobody to fan out to
    let membership = Arc::new(StaticMembership::new(&[("42", &["alice"][..])]));
    let gw1 = fleet.gateway("gw-1", membership);

    gw1.orchestrator
        .send_group("alice", "42", "hello", "")
        .await
        .unwrap();

    assert_eq!(fleet.store.saved().len(), 1);
    assert_eq!(fleet.transport.total_produced(), 0);
    assert!(fleet.offline.queued("alice").is_empty());
}

#[tokio::test]
async fn duplicate_client_token_persists_once_but_still_delivers() {
    let fleet = TestFleet::new();
    let gw1 = fleet.gateway("gw-1", common::no_groups());

    let (bob, mut bob_rx) = ClientSession::new("bob", "gw-1", 16);
    gw1.manager.add(Arc::new(bob));
    fleet.presence.register("bob", "gw-1").await.unwrap();

    gw1.orchestrator
        .send_direct("alice", "bob", "hi", "tok-7")
        .await
        .unwrap();
    gw1.orchestrator
        .send_direct("alice", "bob", "hi", "tok-7")
        .await
        .unwrap();

    // persistence suppressed the duplicate; delivery was unchanged
    assert_eq!(fleet.store.saved().len(), 1);
    assert!(bob_rx.try_recv().is_ok());
    assert!(bob_rx.try_recv().is_ok());
}

#[tokio::test]
async fn send_to_self_stores_and_attempts_delivery() {
    let fleet = TestFleet::new();
    let gw1 = fleet.gateway("gw-1", common::no_groups());

    let (alice, mut alice_rx) = ClientSession::new("alice", "gw-1", 16);
    gw1.manager.add(Arc::new(alice));
    fleet.presence.register("alice", "gw-1").await.unwrap();

    gw1.orchestrator
        .send_direct("alice", "alice", "note to self", "")
        .await
        .unwrap();

    let saved = fleet.store.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].conversation_id, "user:alice:alice");

    // exactly one delivery attempt lands on alice's own session
    assert!(alice_rx.try_recv().is_ok());
    assert!(alice_rx.try_recv().is_err());
}

#[tokio::test]
async fn empty_recipient_is_a_validation_error() {
    let fleet = TestFleet::new();
    let gw1 = fleet.gateway("gw-1", common::no_groups());

    let result = gw1.orchestrator.send_direct("alice", "", "hi", "").await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(fleet.store.saved().is_empty());
}

#[tokio::test]
async fn presence_round_trip() {
    let fleet = TestFleet::new();

    fleet.presence.register("alice", "gw-1").await.unwrap();
    assert_eq!(
        fleet.presence.lookup("alice").await.unwrap().as_deref(),
        Some("gw-1")
    );

    fleet.presence.unregister("alice").await.unwrap();
    assert_eq!(fleet.presence.lookup("alice").await.unwrap(), None);
    // unregister is idempotent
    fleet.presence.unregister("alice").await.unwrap();
}

#[tokio::test]
async fn mixed_fleet_group_fan_out() {
    let fleet = TestFleet::new();
    let membership = Arc::new(StaticMembership::new(&[(
        "42",
        &["alice", "bob", "carol", "dave"][..],
    )]));
    let gw1 = fleet.gateway("gw-1", membership);

    // bob local, carol remote on gw-3, dave offline
    let (bob, mut bob_rx) = ClientSession::new("bob", "gw-1", 16);
    gw1.manager.add(Arc::new(bob));
    fleet.presence.register("alice", "gw-1").await.unwrap();
    fleet.presence.register("bob", "gw-1").await.unwrap();
    fleet.presence.register("carol", "gw-3").await.unwrap();

    gw1.orchestrator
        .send_group("alice", "42", "hello", "")
        .await
        .unwrap();

    // bob delivered locally
    assert!(bob_rx.try_recv().is_ok());
    // carol's record went to gw-3's partition, addressed to carol
    let records = fleet.transport.records(2);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, "carol");
    // dave is offline and group fan-out does not queue
    assert!(fleet.offline.queued("dave").is_empty());
}
