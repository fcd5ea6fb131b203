use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ServerState, error::ApiError, extract::OptionalJson};
use crate::llm::ChatMessage;

pub(super) const DEFAULT_SESSION: &str = "default";

#[derive(Debug, Deserialize)]
pub(super) struct ChatRequest {
    message: Option<String>,
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct ChatResponse {
    response: String,
    session_id: String,
}

pub(super) async fn chat(
    State(state): State<ServerState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;
    let message = request
        .message
        .filter(|message| !message.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Se requiere un 'message' en el JSON".to_string()))?;
    let session_id = session_or_default(request.session_id);

    let sessions = &state.ctx().stores().sessions;
    sessions.ensure(&session_id);
    let history = sessions.history(&session_id);

    let response = state.ctx().assistant().reply(&history, &message).await;

    sessions.append_exchange(
        &session_id,
        ChatMessage::user(message),
        ChatMessage::assistant(response.clone()),
    );
    info!(
        session = %session_id,
        history_len = history.len() + 2,
        "chat exchange recorded"
    );

    Ok(Json(ChatResponse {
        response,
        session_id,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ResetRequest {
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct ResetResponse {
    message: String,
    session_id: String,
}

pub(super) async fn reset(
    State(state): State<ServerState>,
    OptionalJson(request): OptionalJson<ResetRequest>,
) -> Result<Json<ResetResponse>, ApiError> {
    let request = request.unwrap_or_default();
    let session_id = session_or_default(request.session_id);

    let existed = state.ctx().stores().sessions.reset(&session_id);
    let message = if existed {
        format!("Sesión {session_id} reiniciada correctamente")
    } else {
        format!("La sesión {session_id} no existía, se ha creado una nueva")
    };
    info!(session = %session_id, existed, "session reset");

    Ok(Json(ResetResponse {
        message,
        session_id,
    }))
}

fn session_or_default(session_id: Option<String>) -> String {
    session_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION.to_string())
}
