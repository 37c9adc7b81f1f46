//! HTTP surface of the action endpoint
//!
//! `/invoke` always answers 200 when the scan succeeds; the outcome the
//! agent acts on is `response.httpStatusCode` inside the document.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::handler::{handle_invocation, ActionEvent};
use crate::store::TableStore;

#[derive(Clone)]
pub struct ActionState {
    pub store: Arc<dyn TableStore>,
    pub table: String,
}

pub fn router() -> Router<ActionState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/invoke", post(invoke))
}

pub async fn health_check(State(state): State<ActionState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "action-group",
            "version": env!("CARGO_PKG_VERSION"),
            "table": state.table
        })),
    )
}

pub async fn invoke(State(state): State<ActionState>, Json(payload): Json<Value>) -> Response {
    tracing::debug!(envelope = %payload, "Action invocation received");
    let event = ActionEvent::from_value(payload);

    match handle_invocation(state.store.as_ref(), &state.table, &event).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, table = %state.table, "Table scan failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": e.to_string()
                })),
            )
                .into_response()
        }
    }
}
