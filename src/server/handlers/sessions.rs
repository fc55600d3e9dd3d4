use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::server::extract::ApiJson;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ResetSessionRequest {
    pub session_id: String,
}

pub async fn reset_session(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<ResetSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let existed = state.rag.sessions().clear_session(&payload.session_id)?;
    tracing::info!(session_id = %payload.session_id, existed, "Session reset");

    Ok(Json(json!({
        "success": true,
        "message": "Session reset successfully"
    })))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state
        .rag
        .sessions()
        .messages(&session_id)?
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;

    Ok(Json(json!({
        "session_id": session_id,
        "messages": messages
    })))
}
