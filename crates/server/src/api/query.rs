//! Conversational query endpoint.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use chatbot_tool_runtime::Turn;

use crate::state::AppState;

use super::{ApiError, ErrorResponse};

/// Session used when the caller does not name one.
pub const DEFAULT_SESSION_ID: &str = "default";

#[derive(Debug, Deserialize, ToSchema)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QueryResponse {
    pub session_id: String,
    /// Transcript turns: `{seq, role, content}`
    #[schema(value_type = Vec<Object>)]
    pub messages: Vec<Turn>,
}

/// Run a query through the model and tools, returning the transcript.
#[utoipa::path(
    post,
    path = "/query",
    tag = "Query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Transcript of the exchange", body = QueryResponse),
        (status = 400, description = "Empty or malformed query", body = ErrorResponse),
        (status = 429, description = "Model backend throttled", body = ErrorResponse),
        (status = 500, description = "Tool loop exceeded its round limit", body = ErrorResponse),
        (status = 502, description = "Model backend failed", body = ErrorResponse),
        (status = 503, description = "Model backend unavailable", body = ErrorResponse),
        (status = 504, description = "Model call timed out", body = ErrorResponse)
    )
)]
pub async fn query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(req) = payload?;
    if req.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".into()));
    }

    let session_id = req
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string());
    info!(session = %session_id, chars = req.query.len(), "Query received");

    let messages = state
        .sessions
        .submit(&state.agentic_loop, &session_id, req.query)
        .await?;

    Ok(Json(QueryResponse {
        session_id,
        messages,
    }))
}
