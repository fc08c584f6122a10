use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use recipebot_agent::ChatAgent;
use recipebot_core::{Conversation, Message};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Clone)]
pub struct ChatState {
    pub agent: Arc<dyn ChatAgent>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    /// Correlates telemetry spans across calls from one client session.
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatResponse {
    pub messages: Conversation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ChatFailure = (StatusCode, Json<ErrorResponse>);

fn failure(status: StatusCode, error: impl Into<String>) -> ChatFailure {
    (status, Json(ErrorResponse { error: error.into() }))
}

/// One agent turn over HTTP. The reply carries the whole conversation,
/// including the system prompt and the new assistant message.
pub async fn chat(
    State(state): State<ChatState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ChatFailure> {
    if request.messages.is_empty() {
        return Err(failure(StatusCode::BAD_REQUEST, "messages must not be empty"));
    }

    let ChatRequest { messages, session_id } = request;
    let session_id = session_id.as_deref();
    let conversation = Conversation::from_messages(messages);

    match state.agent.respond(&conversation, session_id).await {
        Ok(messages) => {
            info!(
                event_name = "server.chat.completed",
                session_id = session_id.unwrap_or("none"),
                messages = messages.len(),
                "chat turn completed"
            );
            Ok(Json(ChatResponse { messages }))
        }
        Err(error) => {
            warn!(
                event_name = "server.chat.failed",
                session_id = session_id.unwrap_or("none"),
                error = %error,
                "chat turn failed"
            );
            Err(failure(StatusCode::BAD_GATEWAY, error.to_string()))
        }
    }
}
