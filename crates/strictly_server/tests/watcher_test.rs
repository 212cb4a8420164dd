//! Tests for the HTTP client and polling watcher against a live server.

use chrono::TimeDelta;
use std::sync::Arc;
use std::time::Duration;
use strictly_chess::{GameStatus, MoveRequest, Side, StandardChess};
use strictly_server::{
    ApiFailure, ManualClock, MemorySessionStore, PollOutcome, SessionClient, SessionManager,
    SessionWatcher, SyncEvent, router,
};
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Serves a fresh in-memory store on an ephemeral port.
async fn spawn_server() -> (Arc<ManualClock>, SessionClient) {
    let clock = Arc::new(ManualClock::starting_now());
    let store = MemorySessionStore::new(TimeDelta::hours(1)).with_clock(clock.clone());
    let app = router(Arc::new(SessionManager::new(Arc::new(store), StandardChess::new())));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("No local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    (clock, SessionClient::new(format!("http://{}", addr)))
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<SyncEvent>) -> SyncEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("Timed out waiting for event")
        .expect("Watcher channel closed")
}

#[tokio::test]
async fn test_client_round_trip() {
    let (_clock, client) = spawn_server().await;
    let session = client.new_session().await.expect("Create failed");
    let id = session.session_id.clone();

    let moved = client
        .make_move(&id, &MoveRequest::new("e2".into(), "e4".into(), None))
        .await
        .expect("Move failed");
    assert_eq!(moved.applied.san, "e4");
    assert_eq!(moved.session.turn, Side::Black);

    let targets = client.legal_moves(&id, "b8").await.expect("Query failed");
    assert_eq!(targets.len(), 2);

    assert_eq!(
        client.poll(&id, Some(moved.session.version)).await.expect("Poll failed"),
        PollOutcome::Unchanged {
            version: moved.session.version
        }
    );

    let flipped = client.flip(&id).await.expect("Flip failed");
    assert!(flipped.flip);

    let undone = client.undo(&id).await.expect("Undo failed");
    assert_eq!(undone.history_len, 0);

    let reset = client.reset(&id).await.expect("Reset failed");
    assert_eq!(reset.position, session.position);
    assert!(reset.flipped);
}

#[tokio::test]
async fn test_client_surfaces_error_envelope() {
    let (_clock, client) = spawn_server().await;
    let id = client.new_session().await.expect("Create failed").session_id;

    let err = client
        .make_move(&id, &MoveRequest::new("e2".into(), "e5".into(), None))
        .await
        .expect_err("Illegal move accepted");
    let failure = err.downcast_ref::<ApiFailure>().expect("Not an API failure");
    assert_eq!(failure.status.as_u16(), 400);
    assert_eq!(failure.kind, "invalid_move");
}

#[tokio::test]
async fn test_watcher_reports_changes_end_and_expiry() {
    let (clock, client) = spawn_server().await;
    let id = client.new_session().await.expect("Create failed").session_id;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut watcher = SessionWatcher::new(client.clone(), id.clone(), event_tx)
        .with_poll_interval(Duration::from_millis(20));
    let task = tokio::spawn(async move { watcher.run().await });

    match next_event(&mut event_rx).await {
        SyncEvent::Changed(snapshot) => assert_eq!(snapshot.version, 1),
        other => panic!("Expected initial state, got {:?}", other),
    }

    for (from, to) in [("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")] {
        client
            .make_move(&id, &MoveRequest::new(from.into(), to.into(), None))
            .await
            .expect("Move failed");
    }

    // Polling may coalesce intermediate versions; the final one always arrives.
    let ended = loop {
        match next_event(&mut event_rx).await {
            SyncEvent::Changed(_) => continue,
            SyncEvent::Ended(snapshot) => break snapshot,
            SyncEvent::Expired => panic!("Expired too early"),
        }
    };
    assert_eq!(ended.version, 5);
    assert_eq!(ended.status, GameStatus::Checkmate);
    assert_eq!(ended.winner, Some(Side::Black));

    clock.advance(TimeDelta::hours(2));
    assert_eq!(next_event(&mut event_rx).await, SyncEvent::Expired);

    timeout(Duration::from_secs(5), task)
        .await
        .expect("Watcher did not stop")
        .expect("Watcher panicked")
        .expect("Watcher failed");
}

#[tokio::test]
async fn test_watcher_accepts_unbounded_interval() {
    let (_clock, client) = spawn_server().await;
    let id = client.new_session().await.expect("Create failed").session_id;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut watcher =
        SessionWatcher::new(client, id, event_tx).with_poll_interval(Duration::MAX);
    let task = tokio::spawn(async move { watcher.run().await });

    match next_event(&mut event_rx).await {
        SyncEvent::Changed(snapshot) => assert_eq!(snapshot.version, 1),
        other => panic!("Expected initial state, got {:?}", other),
    }
    assert!(!task.is_finished());
    task.abort();
}
