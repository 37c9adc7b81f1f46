//! HTTP API routes for the agent console
//!
//! The page talks to one session actor per conversation; every handler goes
//! through `AppState` to reach it.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

pub mod chat;

use crate::app_state::AppState;

#[derive(Clone)]
pub struct ApiState {
    pub app_state: Arc<AppState>,
}

/// Configure all API routes
pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/config", get(get_config))
        .route("/chat", post(chat::create_chat))
        .route("/chat/{chat_id}", get(chat::get_session))
        .route("/chat/{chat_id}/send", post(chat::send_message))
        .route("/chat/{chat_id}/reset", post(chat::reset_session))
}

/// Health check endpoint
pub async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "agent-console",
            "version": env!("CARGO_PKG_VERSION"),
            "sessions": state.app_state.session_count().await
        })),
    )
}

/// Page header settings
pub async fn get_config(State(state): State<ApiState>) -> impl IntoResponse {
    let ui = state.app_state.ui();
    (
        StatusCode::OK,
        Json(json!({
            "title": ui.title,
            "icon": ui.icon
        })),
    )
}
