//! Readiness and provider status.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use chatbot_tool_runtime::ProviderSummary;

use crate::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when a configured provider is not connected
    pub status: &'static str,
    pub version: &'static str,
    pub backend: String,
    pub model: String,
    pub history: String,
    pub tool_count: usize,
    #[schema(value_type = Vec<Object>)]
    pub providers: Vec<ProviderSummary>,
    /// Effective configuration with secrets left out
    #[schema(value_type = Object)]
    pub config: serde_json::Value,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Server status with per-provider state", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let providers = state.registry.provider_statuses();
    let all_connected = providers.iter().all(|p| p.status.is_connected());
    Json(HealthResponse {
        status: if all_connected { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        backend: state.backend().to_string(),
        model: state.config.llm.model_label().to_string(),
        history: state.sessions.mode().to_string(),
        tool_count: state.registry.len(),
        providers,
        config: state.config.redacted_summary(),
    })
}
