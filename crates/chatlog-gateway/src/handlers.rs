// SPDX-FileCopyrightText: 2026 Chatlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the chatlog REST API.
//!
//! Reads and application management run synchronously against storage.
//! Chat and message mutations go through the dispatcher and answer
//! `202 Accepted` with a status URL the client polls.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use chatlog_core::types::{Application, Chat, Message, SearchHit};
use chatlog_core::{ChatlogError, HealthStatus, ResourceKind, TaskId};
use chatlog_pipeline::TaskHandle;
use chatlog_pipeline::dispatcher::require;

use crate::error::ApiError;
use crate::server::GatewayState;

type ApiResult<T> = Result<T, ApiError>;

/// Default and maximum page size for message search.
const DEFAULT_SEARCH_LIMIT: usize = 20;
const MAX_SEARCH_LIMIT: usize = 100;

/// Success body wrapper: `{"data": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
}

fn data<T: Serialize>(value: T) -> Json<Envelope<T>> {
    Json(Envelope { data: value })
}

// --- Request bodies ---

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateApplicationRequest {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RenameApplicationRequest {
    #[serde(rename = "newName")]
    pub new_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateChatRequest {
    pub subject: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateChatRequest {
    #[serde(rename = "newSubject")]
    pub new_subject: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateMessageRequest {
    pub body: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateMessageRequest {
    #[serde(rename = "newBody")]
    pub new_body: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    pub limit: Option<usize>,
}

// --- Response bodies ---

#[derive(Debug, Serialize)]
pub struct TokenView {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ApplicationView {
    pub name: String,
    pub token: String,
    pub chats_count: i64,
}

impl From<Application> for ApplicationView {
    fn from(app: Application) -> Self {
        Self {
            name: app.name,
            token: app.token,
            chats_count: app.chats_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatView {
    pub number: i64,
    pub subject: String,
    pub messages_count: i64,
}

impl From<Chat> for ChatView {
    fn from(chat: Chat) -> Self {
        Self {
            number: chat.number,
            subject: chat.subject,
            messages_count: chat.messages_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    pub number: i64,
    pub body: String,
}

impl From<Message> for MessageView {
    fn from(message: Message) -> Self {
        Self {
            number: message.number,
            body: message.body,
        }
    }
}

impl From<SearchHit> for MessageView {
    fn from(hit: SearchHit) -> Self {
        Self {
            number: hit.number,
            body: hit.body,
        }
    }
}

/// Body of every `202 Accepted` mutation response.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub task_id: TaskId,
    pub status_url: String,
}

#[derive(Debug, Serialize)]
pub struct QueueCounters {
    pub chats: usize,
    pub messages: usize,
}

#[derive(Debug, Serialize)]
pub struct TaskCounters {
    pub tracked: usize,
    pub pending: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub storage: String,
    pub search: String,
    pub shutting_down: bool,
    pub queues: QueueCounters,
    pub tasks: TaskCounters,
}

// --- Helpers ---

/// Parse a positive path number such as `chat_number`.
pub fn parse_number(field: &str, raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ApiError(ChatlogError::Validation(format!(
            "{field} must be a positive integer"
        )))),
    }
}

/// Absolute URL of the status endpoint for a task.
///
/// Uses the configured public base URL when set, otherwise the request's
/// `Host` header. Falls back to a path-only URL when neither is available.
pub fn status_url(
    public_base_url: Option<&str>,
    headers: &HeaderMap,
    kind: ResourceKind,
    task_id: &TaskId,
) -> String {
    let path = format!("/{kind}/status/{task_id}");
    if let Some(base) = public_base_url {
        return format!("{}{path}", base.trim_end_matches('/'));
    }
    match headers.get(header::HOST).and_then(|v| v.to_str().ok()) {
        Some(host) => format!("http://{host}{path}"),
        None => path,
    }
}

fn accepted(state: &GatewayState, headers: &HeaderMap, handle: TaskHandle) -> Response {
    let status_url = status_url(
        state.public_base_url.as_deref(),
        headers,
        handle.kind.resource(),
        &handle.task_id,
    );
    let body = AcceptedResponse {
        task_id: handle.task_id,
        status_url,
    };
    (StatusCode::ACCEPTED, Json(body)).into_response()
}

fn describe(status: &HealthStatus) -> String {
    match status {
        HealthStatus::Healthy => "healthy".to_string(),
        HealthStatus::Degraded(reason) => format!("degraded: {reason}"),
        HealthStatus::Unhealthy(reason) => format!("unhealthy: {reason}"),
    }
}

// --- Health ---

/// GET /health
///
/// 200 while the primary store answers, 503 otherwise. A degraded search
/// store does not fail the probe since writes still land in storage.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let storage = state
        .storage
        .health_check()
        .await
        .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
    let search = state
        .search
        .health_check()
        .await
        .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));

    let coordinator = state.dispatcher.coordinator();
    let live = matches!(storage, HealthStatus::Healthy) && !coordinator.is_shutting_down();
    let body = HealthResponse {
        status: if live { "ok" } else { "unavailable" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started.elapsed().as_secs(),
        storage: describe(&storage),
        search: describe(&search),
        shutting_down: coordinator.is_shutting_down(),
        queues: QueueCounters {
            chats: coordinator.queue_depth(ResourceKind::Chats),
            messages: coordinator.queue_depth(ResourceKind::Messages),
        },
        tasks: TaskCounters {
            tracked: coordinator.status().len(),
            pending: coordinator.status().pending_count(),
        },
    };
    let code = if live {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, data(body)).into_response()
}

// --- Applications ---

/// POST /applications
pub async fn create_application(
    State(state): State<GatewayState>,
    body: Result<Json<CreateApplicationRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<TokenView>>> {
    let Json(body) = body?;
    require("name", &body.name)?;
    let token = uuid::Uuid::new_v4().to_string();
    let app = state.storage.create_application(&body.name, &token).await?;
    tracing::info!(application_id = app.id.0, "application created");
    Ok(data(TokenView { token: app.token }))
}

/// GET /applications
pub async fn list_applications(
    State(state): State<GatewayState>,
) -> ApiResult<Json<Envelope<Vec<ApplicationView>>>> {
    let apps = state.storage.list_applications().await?;
    Ok(data(apps.into_iter().map(ApplicationView::from).collect()))
}

/// GET /applications/{token}
pub async fn get_application(
    State(state): State<GatewayState>,
    Path(token): Path<String>,
) -> ApiResult<Json<Envelope<ApplicationView>>> {
    let app = state
        .storage
        .get_application(&token)
        .await?
        .ok_or_else(|| ChatlogError::not_found("application", token.as_str()))?;
    Ok(data(ApplicationView::from(app)))
}

/// PATCH /applications/{token}
pub async fn rename_application(
    State(state): State<GatewayState>,
    Path(token): Path<String>,
    body: Result<Json<RenameApplicationRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(body) = body?;
    require("newName", &body.new_name)?;
    state
        .storage
        .update_application_name(&token, &body.new_name)
        .await?
        .ok_or_else(|| ChatlogError::not_found("application", token.as_str()))?;
    Ok(StatusCode::ACCEPTED)
}

// --- Chats ---

/// POST /applications/{token}/chats
pub async fn create_chat(
    State(state): State<GatewayState>,
    Path(token): Path<String>,
    headers: HeaderMap,
    body: Result<Json<CreateChatRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = body?;
    let handle = state.dispatcher.create_chat(&token, &body.subject).await?;
    Ok(accepted(&state, &headers, handle))
}

/// GET /applications/{token}/chats
pub async fn list_chats(
    State(state): State<GatewayState>,
    Path(token): Path<String>,
) -> ApiResult<Json<Envelope<Vec<ChatView>>>> {
    let application_id = state.dispatcher.resolve_application(&token).await?;
    let chats = state.storage.list_chats(application_id).await?;
    Ok(data(chats.into_iter().map(ChatView::from).collect()))
}

/// GET /applications/{token}/chats/{chat_number}
pub async fn get_chat(
    State(state): State<GatewayState>,
    Path((token, chat_number)): Path<(String, String)>,
) -> ApiResult<Json<Envelope<ChatView>>> {
    let number = parse_number("chat_number", &chat_number)?;
    let application_id = state.dispatcher.resolve_application(&token).await?;
    let chat = state
        .storage
        .get_chat(application_id, number)
        .await?
        .ok_or_else(|| ChatlogError::not_found("chat", format!("{token}/{number}")))?;
    Ok(data(ChatView::from(chat)))
}

/// PATCH /applications/{token}/chats/{chat_number}
pub async fn update_chat(
    State(state): State<GatewayState>,
    Path((token, chat_number)): Path<(String, String)>,
    headers: HeaderMap,
    body: Result<Json<UpdateChatRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let number = parse_number("chat_number", &chat_number)?;
    let Json(body) = body?;
    let handle = state
        .dispatcher
        .update_chat(&token, number, &body.new_subject)
        .await?;
    Ok(accepted(&state, &headers, handle))
}

// --- Messages ---

/// POST /applications/{token}/chats/{chat_number}/messages
pub async fn create_message(
    State(state): State<GatewayState>,
    Path((token, chat_number)): Path<(String, String)>,
    headers: HeaderMap,
    body: Result<Json<CreateMessageRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let number = parse_number("chat_number", &chat_number)?;
    let Json(body) = body?;
    let handle = state
        .dispatcher
        .create_message(&token, number, &body.body)
        .await?;
    Ok(accepted(&state, &headers, handle))
}

/// GET /applications/{token}/chats/{chat_number}/messages
pub async fn list_messages(
    State(state): State<GatewayState>,
    Path((token, chat_number)): Path<(String, String)>,
) -> ApiResult<Json<Envelope<Vec<MessageView>>>> {
    let number = parse_number("chat_number", &chat_number)?;
    let chat_id = state.dispatcher.resolve_chat(&token, number).await?;
    let messages = state.storage.list_messages(chat_id).await?;
    Ok(data(messages.into_iter().map(MessageView::from).collect()))
}

/// GET /applications/{token}/chats/{chat_number}/messages/search?query=
pub async fn search_messages(
    State(state): State<GatewayState>,
    Path((token, chat_number)): Path<(String, String)>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> ApiResult<Json<Envelope<Vec<MessageView>>>> {
    let number = parse_number("chat_number", &chat_number)?;
    let Query(params) = params?;
    require("query", &params.query)?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    let chat_id = state.dispatcher.resolve_chat(&token, number).await?;
    let hits = state.search.search(chat_id, &params.query, limit).await?;
    Ok(data(hits.into_iter().map(MessageView::from).collect()))
}

/// GET /applications/{token}/chats/{chat_number}/messages/{message_number}
pub async fn get_message(
    State(state): State<GatewayState>,
    Path((token, chat_number, message_number)): Path<(String, String, String)>,
) -> ApiResult<Json<Envelope<MessageView>>> {
    let chat = parse_number("chat_number", &chat_number)?;
    let number = parse_number("message_number", &message_number)?;
    let chat_id = state.dispatcher.resolve_chat(&token, chat).await?;
    let message = state
        .storage
        .get_message(chat_id, number)
        .await?
        .ok_or_else(|| ChatlogError::not_found("message", format!("{token}/{chat}/{number}")))?;
    Ok(data(MessageView::from(message)))
}

/// PATCH /applications/{token}/chats/{chat_number}/messages/{message_number}
pub async fn update_message(
    State(state): State<GatewayState>,
    Path((token, chat_number, message_number)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Result<Json<UpdateMessageRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let chat = parse_number("chat_number", &chat_number)?;
    let number = parse_number("message_number", &message_number)?;
    let Json(body) = body?;
    let handle = state
        .dispatcher
        .update_message(&token, chat, number, &body.new_body)
        .await?;
    Ok(accepted(&state, &headers, handle))
}

// --- Task status ---

fn task_status(state: &GatewayState, kind: ResourceKind, task_id: String) -> ApiResult<Response> {
    let task_id = TaskId(task_id);
    let snapshot = state.dispatcher.status(&task_id)?;
    if snapshot.kind.resource() != kind {
        return Err(ChatlogError::not_found("task", task_id.to_string()).into());
    }
    Ok(Json(snapshot).into_response())
}

/// GET /chats/status/{task_id}
pub async fn get_chat_status(
    State(state): State<GatewayState>,
    Path(task_id): Path<String>,
) -> ApiResult<Response> {
    task_status(&state, ResourceKind::Chats, task_id)
}

/// GET /messages/status/{task_id}
pub async fn get_message_status(
    State(state): State<GatewayState>,
    Path(task_id): Path<String>,
) -> ApiResult<Response> {
    task_status(&state, ResourceKind::Messages, task_id)
}
