use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use deskpilot_agent::AgentRuntime;
use deskpilot_core::domain::intent::IntentRecord;
use deskpilot_core::errors::InterfaceError;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct ChatState {
    runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub intent: IntentRecord,
    pub correlation_id: String,
}

#[derive(Debug, Serialize)]
pub struct ChatError {
    pub error: String,
    pub detail: String,
    pub correlation_id: String,
}

impl From<InterfaceError> for ChatError {
    fn from(error: InterfaceError) -> Self {
        Self {
            error: error.user_message().to_string(),
            detail: error.to_string(),
            correlation_id: error.correlation_id().to_string(),
        }
    }
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new().route("/api/v1/chat", post(chat)).with_state(ChatState { runtime })
}

pub async fn chat(
    State(state): State<ChatState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ChatError>)> {
    let correlation_id = Uuid::new_v4().to_string();

    if request.message.trim().is_empty() {
        return Err(bad_request("message must not be empty", &correlation_id));
    }

    info!(
        event_name = "server.chat.received",
        correlation_id = %correlation_id,
        message_chars = request.message.len(),
        "chat message received"
    );

    let answer = state.runtime.handle_message_with_id(&request.message, &correlation_id).await;
    let Some(intent) = answer.intent else {
        let error = InterfaceError::Internal {
            message: "message could not be classified".to_string(),
            correlation_id,
        };
        return Err((StatusCode::INTERNAL_SERVER_ERROR, Json(ChatError::from(error))));
    };

    info!(
        event_name = "server.chat.answered",
        correlation_id = %correlation_id,
        action_type = intent.action_type().as_str(),
        reply_chars = answer.reply.len(),
        "chat reply sent"
    );

    Ok(Json(ChatResponse { reply: answer.reply, intent, correlation_id: answer.correlation_id }))
}

fn bad_request(message: &str, correlation_id: &str) -> (StatusCode, Json<ChatError>) {
    let error = InterfaceError::BadRequest {
        message: message.to_string(),
        correlation_id: correlation_id.to_string(),
    };
    (StatusCode::BAD_REQUEST, Json(ChatError::from(error)))
}
