// ABOUTME: Router-level tests for the chat API using tower oneshot requests
// ABOUTME: Covers auth, conversation resolution, sending, loading and read receipts

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use portal_chat::{
    auth::Directory,
    config::ParticipantConfig,
    metrics,
    server::{build_router, AppState},
    store::ChatStore,
};
use portal_chat_core::Role;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

fn participant(id: &str, role: Role) -> ParticipantConfig {
    ParticipantConfig {
        id: id.to_string(),
        display_name: id.to_uppercase(),
        role,
        token: format!("tok-{}", id),
    }
}

fn test_app() -> (Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = ChatStore::new(temp_dir.path()).unwrap();
    let directory = Directory::from_config(&[
        participant("alice", Role::User),
        participant("bob", Role::User),
        participant("carol", Role::Admin),
        participant("root", Role::Superadmin),
    ]);
    let app = build_router(AppState::new(store, directory, metrics::detached_handle()));
    (app, temp_dir)
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn resolve(app: &Router, token: &str, counterpart: &str) -> Value {
    let (status, body) = call(
        app,
        Method::POST,
        "/chat",
        Some(token),
        Some(json!({ "counterpartId": counterpart })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "resolve failed: {}", body);
    body
}

async fn send_text(app: &Router, token: &str, conversation_id: &str, receiver: &str, text: &str) -> (StatusCode, Value) {
    call(
        app,
        Method::POST,
        "/chat/message",
        Some(token),
        Some(json!({
            "conversationId": conversation_id,
            "receiverId": receiver,
            "content": text,
        })),
    )
    .await
}

// =============================================================================
// Public routes and authentication
// =============================================================================

#[tokio::test]
async fn test_health_requires_no_token() {
    let (app, _dir) = test_app();
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_metrics_requires_no_token() {
    let (app, _dir) = test_app();
    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_token_rejected() {
    let (app, _dir) = test_app();
    let (status, body) = call(&app, Method::GET, "/chat", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("bearer token"));
}

#[tokio::test]
async fn test_unknown_token_rejected() {
    let (app, _dir) = test_app();
    let (status, _) = call(&app, Method::GET, "/chat", Some("tok-mallory"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_returns_caller() {
    let (app, _dir) = test_app();
    let (status, body) = call(&app, Method::GET, "/me", Some("tok-root"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "root");
    assert_eq!(body["displayName"], "ROOT");
    assert_eq!(body["role"], "superadmin");
}

// =============================================================================
// Conversation resolution
// =============================================================================

#[tokio::test]
async fn test_resolve_is_symmetric() {
    let (app, _dir) = test_app();
    let from_alice = resolve(&app, "tok-alice", "bob").await;
    let from_bob = resolve(&app, "tok-bob", "alice").await;
    assert_eq!(from_alice["id"], from_bob["id"]);
    assert_eq!(from_alice["participantA"], "alice");
    assert_eq!(from_alice["participantB"], "bob");
}

#[tokio::test]
async fn test_resolve_is_idempotent() {
    let (app, _dir) = test_app();
    let first = resolve(&app, "tok-alice", "bob").await;
    let second = resolve(&app, "tok-alice", "bob").await;
    assert_eq!(first, second);

    let (_, list) = call(&app, Method::GET, "/chat", Some("tok-alice"), None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_resolve_rejects_self() {
    let (app, _dir) = test_app();
    let (status, _) = call(
        &app,
        Method::POST,
        "/chat",
        Some("tok-alice"),
        Some(json!({ "counterpartId": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_resolve_rejects_missing_counterpart() {
    let (app, _dir) = test_app();
    let (status, body) = call(&app, Method::POST, "/chat", Some("tok-alice"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("counterpartId"));
}

#[tokio::test]
async fn test_resolve_unknown_counterpart() {
    let (app, _dir) = test_app();
    let (status, _) = call(
        &app,
        Method::POST,
        "/chat",
        Some("tok-alice"),
        Some(json!({ "counterpartId": "nobody" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (app, _dir) = test_app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/chat")
        .header("authorization", "Bearer tok-alice")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_only_own_conversations() {
    let (app, _dir) = test_app();
    resolve(&app, "tok-alice", "bob").await;
    resolve(&app, "tok-bob", "carol").await;

    let (_, alice) = call(&app, Method::GET, "/chat", Some("tok-alice"), None).await;
    let (_, bob) = call(&app, Method::GET, "/chat", Some("tok-bob"), None).await;
    assert_eq!(alice.as_array().unwrap().len(), 1);
    assert_eq!(bob.as_array().unwrap().len(), 2);
}

// =============================================================================
// Sending and loading
// =============================================================================

#[tokio::test]
async fn test_hello_then_load() {
    let (app, _dir) = test_app();
    let conversation = resolve(&app, "tok-alice", "bob").await;
    let id = conversation["id"].as_str().unwrap();

    let (status, sent) = send_text(&app, "tok-alice", id, "bob", "Hello").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent["kind"], "TEXT");
    assert!(sent.get("action").is_none());
    assert_eq!(sent["readAt"], Value::Null);

    let (status, messages) = call(
        &app,
        Method::GET,
        &format!("/chat/{}/messages", id),
        Some("tok-bob"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "Hello");
    assert_eq!(messages[0]["senderId"], "alice");
    assert_eq!(messages[0]["receiverId"], "bob");
}

#[tokio::test]
async fn test_outsider_cannot_send_or_load() {
    let (app, _dir) = test_app();
    let conversation = resolve(&app, "tok-alice", "bob").await;
    let id = conversation["id"].as_str().unwrap();

    let (status, _) = send_text(&app, "tok-carol", id, "bob", "hi").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/chat/{}/messages", id),
        Some("tok-carol"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_send_to_wrong_receiver_rejected() {
    let (app, _dir) = test_app();
    let conversation = resolve(&app, "tok-alice", "bob").await;
    let id = conversation["id"].as_str().unwrap();
    let (status, _) = send_text(&app, "tok-alice", id, "carol", "hi").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_send_empty_text_rejected() {
    let (app, _dir) = test_app();
    let conversation = resolve(&app, "tok-alice", "bob").await;
    let id = conversation["id"].as_str().unwrap();
    let (status, _) = send_text(&app, "tok-alice", id, "bob", "   ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_send_to_unknown_conversation() {
    let (app, _dir) = test_app();
    let (status, _) = send_text(&app, "tok-alice", "missing", "bob", "hi").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_load_unknown_conversation() {
    let (app, _dir) = test_app();
    let (status, _) = call(&app, Method::GET, "/chat/missing/messages", Some("tok-alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// System messages
// =============================================================================

async fn send_system(app: &Router, token: &str, conversation_id: &str, receiver: &str, action: &str) -> (StatusCode, Value) {
    call(
        app,
        Method::POST,
        "/chat/message",
        Some(token),
        Some(json!({
            "conversationId": conversation_id,
            "receiverId": receiver,
            "content": "Schedule interview",
            "kind": "SYSTEM",
            "action": action,
        })),
    )
    .await
}

#[tokio::test]
async fn test_superadmin_sends_system_message() {
    let (app, _dir) = test_app();
    let conversation = resolve(&app, "tok-root", "alice").await;
    let id = conversation["id"].as_str().unwrap();

    let (status, sent) = send_system(&app, "tok-root", id, "alice", "PROCEED_TO_INTERVIEW").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent["kind"], "SYSTEM");
    assert_eq!(sent["action"], "PROCEED_TO_INTERVIEW");
}

#[tokio::test]
async fn test_non_superadmin_system_message_forbidden() {
    let (app, _dir) = test_app();
    let conversation = resolve(&app, "tok-carol", "alice").await;
    let id = conversation["id"].as_str().unwrap();

    let (status, _) = send_system(&app, "tok-carol", id, "alice", "PROCEED_TO_INTERVIEW").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_system_action_rejected() {
    let (app, _dir) = test_app();
    let conversation = resolve(&app, "tok-root", "alice").await;
    let id = conversation["id"].as_str().unwrap();

    let (status, body) = send_system(&app, "tok-root", id, "alice", "REVOKE_EVERYTHING").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("REVOKE_EVERYTHING"));
}

#[tokio::test]
async fn test_text_with_action_rejected() {
    let (app, _dir) = test_app();
    let conversation = resolve(&app, "tok-root", "alice").await;
    let id = conversation["id"].as_str().unwrap();

    let (status, _) = call(
        &app,
        Method::POST,
        "/chat/message",
        Some("tok-root"),
        Some(json!({
            "conversationId": id,
            "receiverId": "alice",
            "content": "hi",
            "kind": "TEXT",
            "action": "PROCEED_TO_INTERVIEW",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Read receipts
// =============================================================================

#[tokio::test]
async fn test_mark_read_by_receiver_only_and_first_wins() {
    let (app, _dir) = test_app();
    let conversation = resolve(&app, "tok-alice", "bob").await;
    let id = conversation["id"].as_str().unwrap();
    let (_, sent) = send_text(&app, "tok-alice", id, "bob", "ping").await;
    let uri = format!("/chat/message/{}/read", sent["id"].as_str().unwrap());

    let (status, _) = call(&app, Method::PUT, &uri, Some("tok-alice"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, first) = call(&app, Method::PUT, &uri, Some("tok-bob"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(first["readAt"].is_string());
    assert_eq!(first["content"], "ping");

    let (status, second) = call(&app, Method::PUT, &uri, Some("tok-bob"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["readAt"], second["readAt"]);
}

#[tokio::test]
async fn test_mark_read_unknown_message() {
    let (app, _dir) = test_app();
    let (status, _) = call(
        &app,
        Method::PUT,
        "/chat/message/missing/read",
        Some("tok-bob"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
