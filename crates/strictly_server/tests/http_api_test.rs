//! Tests for the HTTP routes, driven through the router without a socket.

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use chrono::TimeDelta;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use strictly_chess::StandardChess;
use strictly_server::{MemorySessionStore, SessionManager, router};
use tower::ServiceExt;

fn setup_app() -> Router {
    let store = Arc::new(MemorySessionStore::new(TimeDelta::hours(3)));
    router(Arc::new(SessionManager::new(store, StandardChess::new())))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: &[(header::HeaderName, &str)],
) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(name, *value);
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("Failed to build request");

    let response = app.clone().oneshot(request).await.expect("Request failed");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Body is not JSON")
    };
    (status, headers, value)
}

async fn new_session(app: &Router) -> String {
    let (status, _, body) = send(app, "POST", "/new-session", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    body["sessionId"].as_str().expect("Missing sessionId").to_string()
}

#[tokio::test]
async fn test_new_session_snapshot_shape() {
    let app = setup_app();
    let (status, headers, body) = send(&app, "POST", "/new-session", None, &[]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::ETAG).map(|v| v.as_bytes()), Some(&b"\"1\""[..]));
    assert_eq!(body["turn"], "w");
    assert_eq!(body["status"], "ongoing");
    assert_eq!(body["ended"], false);
    assert_eq!(body["flip"], false);
    assert_eq!(body["winner"], Value::Null);
    assert_eq!(body["historyLen"], 0);
    assert_eq!(body["version"], 1);
    assert!(body["fen"].as_str().is_some_and(|f| f.starts_with("rnbqkbnr/")));
}

#[tokio::test]
async fn test_move_response() {
    let app = setup_app();
    let id = new_session(&app).await;

    let (status, _, body) = send(
        &app,
        "POST",
        &format!("/session/{}/move", id),
        Some(json!({ "from": "e2", "to": "e4" })),
        &[],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["move"]["san"], "e4");
    assert_eq!(body["move"]["color"], "w");
    assert_eq!(body["status"], "ongoing");
    assert_eq!(body["fen"], body["session"]["fen"]);
    assert_eq!(body["session"]["turn"], "b");
    assert_eq!(body["session"]["lastMove"]["to"], "e4");
    assert_eq!(body["session"]["version"], 2);
}

#[tokio::test]
async fn test_illegal_move_is_bad_request() {
    let app = setup_app();
    let id = new_session(&app).await;

    let (status, _, body) = send(
        &app,
        "POST",
        &format!("/session/{}/move", id),
        Some(json!({ "from": "e2", "to": "e5" })),
        &[],
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_move");
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let app = setup_app();
    let (status, _, body) = send(&app, "GET", "/session/99999", None, &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "session_not_found");
}

#[tokio::test]
async fn test_poll_not_modified() {
    let app = setup_app();
    let id = new_session(&app).await;
    let uri = format!("/session/{}", id);

    let (status, _, body) = send(&app, "GET", &format!("{}?since=1", uri), None, &[]).await;
    assert_eq!(status, StatusCode::NOT_MODIFIED);
    assert_eq!(body, Value::Null);

    let (status, _, _) = send(&app, "GET", &uri, None, &[(header::IF_NONE_MATCH, "\"1\"")]).await;
    assert_eq!(status, StatusCode::NOT_MODIFIED);

    send(&app, "POST", &format!("{}/flip", uri), None, &[]).await;

    let (status, headers, body) = send(&app, "GET", &format!("{}?since=1", uri), None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 2);
    assert_eq!(headers.get(header::ETAG).map(|v| v.as_bytes()), Some(&b"\"2\""[..]));
}

#[tokio::test]
async fn test_legal_moves_route() {
    let app = setup_app();
    let id = new_session(&app).await;

    let (status, _, body) =
        send(&app, "GET", &format!("/session/{}/legal-moves?from=g1", id), None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    let mut targets: Vec<&str> = body["moves"]
        .as_array()
        .expect("moves is an array")
        .iter()
        .filter_map(|m| m["to"].as_str())
        .collect();
    targets.sort();
    assert_eq!(targets, vec!["f3", "h3"]);

    let (status, _, body) =
        send(&app, "GET", &format!("/session/{}/legal-moves", id), None, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "missing_parameter");
}

#[tokio::test]
async fn test_resign_then_move_conflicts() {
    let app = setup_app();
    let id = new_session(&app).await;

    let (status, _, body) = send(
        &app,
        "POST",
        &format!("/session/{}/resign", id),
        Some(json!({ "color": "w" })),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "White resigned, Black wins");
    assert_eq!(body["session"]["winner"], "b");
    assert_eq!(body["session"]["outcome"]["reason"], "resignation");

    let (status, _, body) = send(
        &app,
        "POST",
        &format!("/session/{}/move", id),
        Some(json!({ "from": "e2", "to": "e4" })),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "game_already_ended");
}

#[tokio::test]
async fn test_resign_invalid_color() {
    let app = setup_app();
    let id = new_session(&app).await;
    let (status, _, body) = send(
        &app,
        "POST",
        &format!("/session/{}/resign", id),
        Some(json!({ "color": "purple" })),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_side");
}

#[tokio::test]
async fn test_undo_flip_and_newgame() {
    let app = setup_app();
    let id = new_session(&app).await;

    let (status, _, body) = send(&app, "POST", &format!("/session/{}/undo", id), None, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "no_undo_available");

    send(
        &app,
        "POST",
        &format!("/session/{}/move", id),
        Some(json!({ "from": "e2", "to": "e4" })),
        &[],
    )
    .await;

    let (status, _, body) = send(&app, "POST", &format!("/session/{}/undo", id), None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["historyLen"], 0);
    assert_eq!(body["turn"], "w");

    let (status, _, body) = send(&app, "POST", &format!("/session/{}/flip", id), None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["flip"], true);
    assert_eq!(body["session"]["flip"], true);

    let (status, _, body) =
        send(&app, "POST", &format!("/session/{}/newgame", id), None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessionId"], id);
    assert_eq!(body["flip"], true);
    assert_eq!(body["historyLen"], 0);
}

#[tokio::test]
async fn test_resign_without_body_is_invalid_side() {
    let app = setup_app();
    let id = new_session(&app).await;

    let (status, _, body) =
        send(&app, "POST", &format!("/session/{}/resign", id), None, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_side");

    let (_, _, body) = send(&app, "GET", &format!("/session/{}", id), None, &[]).await;
    assert_eq!(body["ended"], false);
}

#[tokio::test]
async fn test_move_missing_field_uses_error_envelope() {
    let app = setup_app();
    let id = new_session(&app).await;

    let (status, _, body) = send(
        &app,
        "POST",
        &format!("/session/{}/move", id),
        Some(json!({ "from": "e2" })),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "bad_request");
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));

    let (status, _, body) =
        send(&app, "POST", &format!("/session/{}/move", id), None, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "bad_request");
}

#[tokio::test]
async fn test_malformed_since_uses_error_envelope() {
    let app = setup_app();
    let id = new_session(&app).await;

    let (status, _, body) =
        send(&app, "GET", &format!("/session/{}?since=abc", id), None, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "bad_request");
    assert!(body["error"].as_str().is_some());
}
