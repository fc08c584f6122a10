use std::sync::Arc;

use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use recipebot_agent::ChatAgent;

use crate::chat::{chat, ChatState};
use crate::health::{health, HealthState};

#[derive(Clone)]
pub struct AppState {
    pub chat: ChatState,
    pub health: HealthState,
}

impl FromRef<AppState> for ChatState {
    fn from_ref(state: &AppState) -> Self {
        state.chat.clone()
    }
}

impl FromRef<AppState> for HealthState {
    fn from_ref(state: &AppState) -> Self {
        state.health.clone()
    }
}

pub fn router(agent: Arc<dyn ChatAgent>, model: impl Into<String>) -> Router {
    let state = AppState {
        chat: ChatState { agent },
        health: HealthState { model: model.into() },
    };

    Router::new().route("/chat", post(chat)).route("/health", get(health)).with_state(state)
}
