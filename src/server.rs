// ABOUTME: HTTP message service for one-to-one chat
// ABOUTME: Conversation resolve/list, message send/load and read receipts behind bearer auth

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use portal_chat_core::{
    Conversation, Message, MessageBody, Participant, ResolveConversationRequest,
    SendMessageRequest,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::{
    auth::{require_bearer, Directory},
    config::Config,
    error::ApiError,
    metrics,
    store::ChatStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: ChatStore,
    pub directory: Directory,
    pub metrics: Arc<PrometheusHandle>,
}

impl AppState {
    pub fn new(store: ChatStore, directory: Directory, metrics: PrometheusHandle) -> Self {
        Self {
            store,
            directory,
            metrics: Arc::new(metrics),
        }
    }
}

/// Build the full router. Chat routes require a bearer token; health and
/// metrics do not.
pub fn build_router(state: AppState) -> Router {
    let chat_routes = Router::new()
        .route("/me", get(whoami))
        .route("/chat", post(resolve_conversation).get(list_conversations))
        .route("/chat/message", post(send_message))
        .route("/chat/{conversation_id}/messages", get(load_messages))
        .route("/chat/message/{message_id}/read", put(mark_read))
        .layer(middleware::from_fn_with_state(
            state.directory.clone(),
            require_bearer,
        ))
        .with_state(state.clone());

    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state);

    Router::new()
        .merge(chat_routes)
        .merge(public_routes)
        .layer(TraceLayer::new_for_http())
}

/// Serve on an already-bound listener until the process exits
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> Result<()> {
    let app = build_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Start the chat service from configuration
pub async fn start_server(config: &Config) -> Result<()> {
    let store = ChatStore::open(config.database_path())?;
    let directory = Directory::from_config(&config.participants);
    if directory.is_empty() {
        tracing::warn!("No participants configured; every chat request will be rejected");
    }

    let metrics_handle =
        metrics::init_metrics().context("Failed to initialize Prometheus metrics")?;

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(
        addr = %addr,
        participants = directory.len(),
        "Starting chat server"
    );

    serve(listener, AppState::new(store, directory, metrics_handle)).await
}

/// Record the request counter for a handler result
fn observe<T>(route: &'static str, result: Result<T, ApiError>) -> Result<T, ApiError> {
    match &result {
        Ok(_) => metrics::record_request(route, "ok"),
        Err(e) => metrics::record_request(route, e.kind()),
    }
    result
}

fn parse_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.render()
}

async fn whoami(Extension(me): Extension<Participant>) -> Json<Participant> {
    Json(me)
}

async fn resolve_conversation(
    State(state): State<AppState>,
    Extension(me): Extension<Participant>,
    payload: Result<Json<ResolveConversationRequest>, JsonRejection>,
) -> Result<Json<Conversation>, ApiError> {
    observe("resolve", resolve_inner(&state, &me, payload))
}

fn resolve_inner(
    state: &AppState,
    me: &Participant,
    payload: Result<Json<ResolveConversationRequest>, JsonRejection>,
) -> Result<Json<Conversation>, ApiError> {
    let request = parse_json(payload)?;
    let counterpart_id = request
        .counterpart_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("counterpartId is required".to_string()))?;

    if counterpart_id == me.id {
        return Err(ApiError::BadRequest(
            "Cannot open a conversation with yourself".to_string(),
        ));
    }
    if state.directory.get(counterpart_id).is_none() {
        return Err(ApiError::NotFound(format!(
            "Unknown participant: {}",
            counterpart_id
        )));
    }

    let (conversation, created) = state
        .store
        .get_or_create_conversation(&me.id, counterpart_id)?;
    if created {
        metrics::record_conversation_created();
    }
    Ok(Json(conversation))
}

async fn list_conversations(
    State(state): State<AppState>,
    Extension(me): Extension<Participant>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let result = state
        .store
        .list_conversations_for(&me.id)
        .map(Json)
        .map_err(ApiError::from);
    observe("list", result)
}

async fn send_message(
    State(state): State<AppState>,
    Extension(me): Extension<Participant>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    observe("send", send_inner(&state, &me, payload))
}

fn send_inner(
    state: &AppState,
    me: &Participant,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    let request = parse_json(payload)?;
    let body = request
        .body()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let conversation = member_conversation(state, me, &request.conversation_id)?;
    let counterpart = conversation.counterpart_of(&me.id).unwrap_or_default();
    if request.receiver_id != counterpart {
        return Err(ApiError::BadRequest(
            "receiverId must be the other participant of the conversation".to_string(),
        ));
    }

    match &body {
        MessageBody::Text { content } if content.trim().is_empty() => {
            return Err(ApiError::BadRequest("content must not be empty".to_string()));
        }
        MessageBody::Text { .. } => {}
        MessageBody::System { action, .. } => {
            if !me.role.can_signal() {
                tracing::warn!(
                    sender = %me.id,
                    role = %me.role,
                    action = %action,
                    "System message rejected: sender may not signal"
                );
                return Err(ApiError::Forbidden(
                    "Only superadmins may send system messages".to_string(),
                ));
            }
            if !action.is_recognized() {
                return Err(ApiError::BadRequest(format!(
                    "Unsupported system action: {}",
                    action
                )));
            }
        }
    }

    let message = state.store.insert_message(
        &conversation.id,
        &me.id,
        &request.receiver_id,
        &body,
    )?;
    metrics::record_message_sent(&message.kind().to_string());

    tracing::info!(
        conversation_id = %conversation.id,
        message_id = %message.id,
        sender = %me.id,
        kind = %message.kind(),
        "Message stored"
    );
    Ok(Json(message))
}

async fn load_messages(
    State(state): State<AppState>,
    Extension(me): Extension<Participant>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let result = member_conversation(&state, &me, &conversation_id).and_then(|conversation| {
        state
            .store
            .list_messages(&conversation.id)
            .map(Json)
            .map_err(ApiError::from)
    });
    observe("load", result)
}

async fn mark_read(
    State(state): State<AppState>,
    Extension(me): Extension<Participant>,
    Path(message_id): Path<String>,
) -> Result<Json<Message>, ApiError> {
    observe("read", mark_read_inner(&state, &me, &message_id))
}

fn mark_read_inner(
    state: &AppState,
    me: &Participant,
    message_id: &str,
) -> Result<Json<Message>, ApiError> {
    let not_found = || ApiError::NotFound(format!("Message not found: {}", message_id));

    let message = state.store.get_message(message_id)?.ok_or_else(not_found)?;
    if message.receiver_id != me.id {
        return Err(ApiError::Forbidden(
            "Only the receiver may mark a message read".to_string(),
        ));
    }

    let updated = state
        .store
        .mark_read(message_id, Utc::now())?
        .ok_or_else(not_found)?;
    Ok(Json(updated))
}

/// Look up a conversation the caller belongs to
fn member_conversation(
    state: &AppState,
    me: &Participant,
    conversation_id: &str,
) -> Result<Conversation, ApiError> {
    let conversation = state
        .store
        .get_conversation(conversation_id)?
        .ok_or_else(|| {
            ApiError::NotFound(format!("Conversation not found: {}", conversation_id))
        })?;
    if !conversation.involves(&me.id) {
        return Err(ApiError::Forbidden(
            "Not a participant of this conversation".to_string(),
        ));
    }
    Ok(conversation)
}
