//! API endpoint modules.
//!
//! Each sub-module owns one area of the facade. The shared error body and
//! the error → status mapping live here.

pub mod doc;
mod health;
mod query;
mod tools;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;

use chatbot_tool_runtime::{AgenticLoopError, LlmError, RouterError};

// ── Shared types ─────────────────────────────────────────────────

/// Error body returned by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// Which part of the gateway failed: `model_gateway`, `tool_router`,
    /// `tool_provider`, `conversation` or `request`.
    pub component: &'static str,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Conversation(#[from] AgenticLoopError),
    #[error(transparent)]
    Router(#[from] RouterError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conversation(AgenticLoopError::LlmError(e)) => match e {
                LlmError::Throttled(_) => StatusCode::TOO_MANY_REQUESTS,
                LlmError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                LlmError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::BAD_GATEWAY,
            },
            ApiError::Conversation(AgenticLoopError::LoopExceeded(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Router(RouterError::ToolNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Router(RouterError::Provider { .. }) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn component(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "request",
            ApiError::Conversation(AgenticLoopError::LlmError(_)) => "model_gateway",
            ApiError::Conversation(AgenticLoopError::LoopExceeded(_)) => "conversation",
            ApiError::Router(RouterError::ToolNotFound(_)) => "tool_router",
            ApiError::Router(RouterError::Provider { .. }) => "tool_provider",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let component = self.component();
        if status.is_server_error() {
            error!(component, status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(component, status = status.as_u16(), error = %self, "Request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
                component,
            }),
        )
            .into_response()
    }
}

// ── Re-exports ───────────────────────────────────────────────────

pub use health::health;
pub use query::query;
pub use tools::{invoke_tool, list_tools};
