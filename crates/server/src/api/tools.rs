//! Tool listing and direct invocation, bypassing the model.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use utoipa::ToSchema;

use chatbot_tool_runtime::{ToolCall, ToolDefinition};

use crate::state::AppState;

use super::{ApiError, ErrorResponse};

#[derive(Debug, Serialize, ToSchema)]
pub struct ToolsResponse {
    /// `{name, description, input_schema}` per tool, in registration order
    #[schema(value_type = Vec<Object>)]
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ToolInvokeRequest {
    pub name: String,
    #[serde(default = "empty_args")]
    #[schema(value_type = Object)]
    pub args: Value,
}

fn empty_args() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ToolInvokeResponse {
    /// Raw payload returned by the provider
    #[schema(value_type = Object)]
    pub result: Value,
}

/// List every tool in the aggregated namespace.
#[utoipa::path(
    get,
    path = "/tools",
    tag = "Tools",
    responses(
        (status = 200, description = "Aggregated tool catalog", body = ToolsResponse)
    )
)]
pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<ToolsResponse> {
    Json(ToolsResponse {
        tools: state.registry.list(),
    })
}

/// Invoke one tool directly with the given arguments.
#[utoipa::path(
    post,
    path = "/tool",
    tag = "Tools",
    request_body = ToolInvokeRequest,
    responses(
        (status = 200, description = "Raw tool result", body = ToolInvokeResponse),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 404, description = "Tool not found", body = ErrorResponse),
        (status = 502, description = "Tool provider failed", body = ErrorResponse)
    )
)]
pub async fn invoke_tool(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ToolInvokeRequest>, JsonRejection>,
) -> Result<Json<ToolInvokeResponse>, ApiError> {
    let Json(req) = payload?;
    let call = ToolCall {
        id: format!("direct_{}", uuid::Uuid::new_v4().simple()),
        name: req.name,
        input: req.args,
    };
    info!(tool = %call.name, call_id = %call.id, "Direct tool invocation");

    let result = state.registry.invoke(&call).await?;
    Ok(Json(ToolInvokeResponse {
        result: result.payload(),
    }))
}
