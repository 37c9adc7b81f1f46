//! Chat API endpoints
//!
//! A turn either commits (prompt and answer appended, panels replaced) or
//! fails with the session left as it was; the status code tells which stage
//! failed.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_types::{SessionSnapshot, TurnView};

use crate::api::ApiState;
use crate::session::{self, TurnError};

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub success: bool,
    pub chat_id: String,
    pub turn: TurnView,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub chat_id: String,
    pub session: SessionSnapshot,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "error": error.into()
        })),
    )
        .into_response()
}

fn turn_error_status(err: &TurnError) -> StatusCode {
    match err {
        TurnError::EmptyPrompt => StatusCode::BAD_REQUEST,
        TurnError::Agent(_) => StatusCode::BAD_GATEWAY,
        TurnError::Normalize(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn session_response(chat_id: String, session: SessionSnapshot) -> Response {
    (
        StatusCode::OK,
        Json(SessionResponse {
            success: true,
            chat_id,
            session,
        }),
    )
        .into_response()
}

/// Start a new conversation
pub async fn create_chat(State(state): State<ApiState>) -> Response {
    let chat_id = ulid::Ulid::new().to_string();
    let actor = match state.app_state.get_or_create_session(&chat_id).await {
        Ok(actor) => actor,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    };

    match session::get_snapshot(&actor).await {
        Ok(snapshot) => session_response(chat_id, snapshot),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read session: {e}"),
        ),
    }
}

/// Current transcript, citations and trace of a conversation
pub async fn get_session(
    Path(chat_id): Path<String>,
    State(state): State<ApiState>,
) -> Response {
    let actor = match state.app_state.get_or_create_session(&chat_id).await {
        Ok(actor) => actor,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    };

    match session::get_snapshot(&actor).await {
        Ok(snapshot) => session_response(chat_id, snapshot),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read session: {e}"),
        ),
    }
}

/// Run one turn
pub async fn send_message(
    Path(chat_id): Path<String>,
    State(state): State<ApiState>,
    Json(req): Json<SendMessageRequest>,
) -> Response {
    let actor = match state.app_state.get_or_create_session(&chat_id).await {
        Ok(actor) => actor,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    };

    match session::send_prompt(&actor, req.text).await {
        Ok(Ok(turn)) => (
            StatusCode::OK,
            Json(TurnResponse {
                success: true,
                chat_id,
                turn,
            }),
        )
            .into_response(),
        Ok(Err(err)) => error_response(turn_error_status(&err), err.to_string()),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Session actor error: {e}"),
        ),
    }
}

/// Replace the conversation's session with a fresh one
pub async fn reset_session(
    Path(chat_id): Path<String>,
    State(state): State<ApiState>,
) -> Response {
    let actor = match state.app_state.get_or_create_session(&chat_id).await {
        Ok(actor) => actor,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    };

    match session::reset_session(&actor).await {
        Ok(snapshot) => session_response(chat_id, snapshot),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to reset session: {e}"),
        ),
    }
}
