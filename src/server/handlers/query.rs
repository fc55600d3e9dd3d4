use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::rag::models::Source;
use crate::server::extract::ApiJson;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub session_id: String,
}

pub async fn query_documents(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = match payload.session_id {
        Some(id) => id,
        None => state.rag.sessions().create_session()?,
    };

    tracing::info!(session_id = %session_id, "Answering query");

    let generation = state
        .rag
        .query(&payload.query, Some(&session_id))
        .await
        .map_err(|e| ApiError::Internal(e.detail()))?;

    Ok(Json(QueryResponse {
        answer: generation.answer,
        sources: generation.sources,
        session_id,
    }))
}
