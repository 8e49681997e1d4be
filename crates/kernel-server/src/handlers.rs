//! HTTP Handlers

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};

use kernel_core::{
    Arguments, ErrorKind, KernelError, Message, Task, TaskResult, ToolSchema, bus::publish_json,
};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub environment: String,
    pub providers: usize,
    pub tools: usize,
}

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub default: String,
    pub providers: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub tool: String,
    #[serde(default)]
    pub args: Arguments,
}

impl TaskRequest {
    fn into_task(self) -> Task {
        match self.id.filter(|id| !id.trim().is_empty()) {
            Some(id) => Task::new(id, self.tool, self.args),
            None => Task::generated(self.tool, self.args),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub task_id: String,
    pub topic: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Provider for a new session; ignored for existing ones
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub session_id: String,
    pub memory_count: usize,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput | ErrorKind::MalformedCommand => StatusCode::BAD_REQUEST,
        ErrorKind::ToolNotFound | ErrorKind::ProviderNotFound => StatusCode::NOT_FOUND,
        ErrorKind::DuplicateName => StatusCode::CONFLICT,
        ErrorKind::ToolExecutionFailed => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Provider => StatusCode::BAD_GATEWAY,
        ErrorKind::Cancelled | ErrorKind::Bus => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(e: &KernelError) -> ApiError {
    (
        status_for(e.kind()),
        Json(ErrorResponse {
            error: e.user_message(),
            code: e.code().into(),
        }),
    )
}

fn session_not_found(session_id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Session not found: {session_id}"),
            code: "SESSION_NOT_FOUND".into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
        providers: state.kernel.providers().len(),
        tools: state.kernel.tools().len(),
    })
}

pub async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    let providers = state.kernel.providers();
    let mut names = providers.list();
    names.sort();

    Json(ProvidersResponse {
        default: providers.default_name().to_string(),
        providers: names,
    })
}

pub async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolSchema>> {
    Json(state.kernel.tools().schemas())
}

/// Execute a task directly. The result body is returned whether or not the task succeeded.
pub async fn execute_task(
    State(state): State<AppState>,
    Json(payload): Json<TaskRequest>,
) -> (StatusCode, Json<TaskResult>) {
    let task = payload.into_task();

    match state.kernel.execute(&task).await {
        Ok(result) => (StatusCode::OK, Json(result)),
        Err(failure) => {
            tracing::warn!(task_id = %task.id, tool = %task.tool, code = failure.kind().code(), "Task failed");
            (status_for(failure.kind()), Json(failure.result))
        }
    }
}

/// Queue a task for the bus dispatcher
pub async fn publish_task(
    State(state): State<AppState>,
    Json(payload): Json<TaskRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let task = payload.into_task();
    let topic = state.config.task_topic.clone();

    publish_json(state.bus.as_ref(), &topic, &task)
        .await
        .map_err(|e| {
            tracing::error!(task_id = %task.id, error = %e, "Failed to publish task");
            api_error(&e)
        })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            task_id: task.id,
            topic,
        }),
    ))
}

/// One conversation turn within a session
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(&KernelError::InvalidInput("message cannot be empty".into())));
    }

    let session_id = payload
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let session = state
        .session(&session_id, payload.provider.as_deref())
        .map_err(|e| api_error(&e))?;
    let mut conversation = session.lock().await;

    let message = conversation
        .process_request(&payload.message)
        .await
        .map_err(|e| {
            tracing::error!(session_id = %session_id, error = %e, "Conversation turn failed");
            api_error(&e)
        })?;

    Ok(Json(ChatResponse {
        message,
        memory_count: conversation.memory_count(),
        session_id,
    }))
}

pub async fn chat_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let session = state
        .existing_session(&session_id)
        .ok_or_else(|| session_not_found(&session_id))?;
    let messages = session.lock().await.history();

    Ok(Json(HistoryResponse {
        session_id,
        messages,
    }))
}

pub async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.remove_session(&session_id) {
        tracing::info!(session_id = %session_id, "Session ended");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(session_not_found(&session_id))
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/providers", get(list_providers))
        .route("/api/tools", get(list_tools))
        // Kernel API
        .route("/api/tasks", post(execute_task))
        .route("/api/bus/tasks", post(publish_task))
        // Conversation API
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/{session_id}/history", get(chat_history))
        .route("/api/chat/{session_id}", delete(end_session))
}
