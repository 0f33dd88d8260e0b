//! Error types for the MCP crate.

use chatbot_tool_runtime::ToolError;

use crate::types::{error_codes, JsonRpcError};

/// Errors that can occur during MCP operations.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// Failed to parse JSON.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Transport I/O error.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The provider process could not be started.
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The launch configuration cannot be turned into a command.
    #[error("Invalid launch configuration: {0}")]
    InvalidLaunch(String),

    /// The requested method is not supported.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Invalid parameters for a method.
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// The requested tool was not found.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool execution failed.
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// The peer answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Protocol version mismatch.
    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    /// Server/client not initialized.
    #[error("Not initialized: call initialize first")]
    NotInitialized,

    /// The MCP server process exited or is unavailable.
    #[error("Server unavailable: {0}")]
    ServerUnavailable(String),
}

impl McpError {
    /// Convert to a JSON-RPC error object.
    pub fn to_rpc_error(&self) -> JsonRpcError {
        let (code, message) = match self {
            McpError::JsonParse(_) => (error_codes::PARSE_ERROR, self.to_string()),
            McpError::MethodNotFound(_) => (error_codes::METHOD_NOT_FOUND, self.to_string()),
            McpError::InvalidParams(_) => (error_codes::INVALID_PARAMS, self.to_string()),
            McpError::ToolNotFound(_) => (error_codes::INVALID_PARAMS, self.to_string()),
            McpError::Rpc { code, message } => (*code, message.clone()),
            _ => (error_codes::INTERNAL_ERROR, self.to_string()),
        };
        JsonRpcError {
            code,
            message,
            data: None,
        }
    }
}

impl From<McpError> for ToolError {
    fn from(err: McpError) -> Self {
        match err {
            McpError::ServerUnavailable(msg) => ToolError::Unavailable(msg),
            McpError::Transport(e) => ToolError::Unavailable(e.to_string()),
            McpError::ToolNotFound(name) => ToolError::NotFound(name),
            McpError::InvalidParams(msg) => ToolError::InvalidInput(msg),
            other => ToolError::ExecutionFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_codes() {
        assert_eq!(
            McpError::MethodNotFound("x".into()).to_rpc_error().code,
            error_codes::METHOD_NOT_FOUND
        );
        assert_eq!(
            McpError::ToolNotFound("x".into()).to_rpc_error().code,
            error_codes::INVALID_PARAMS
        );
        assert_eq!(
            McpError::NotInitialized.to_rpc_error().code,
            error_codes::INTERNAL_ERROR
        );
        let passthrough = McpError::Rpc {
            code: -32001,
            message: "custom".into(),
        }
        .to_rpc_error();
        assert_eq!(passthrough.code, -32001);
        assert_eq!(passthrough.message, "custom");
    }

    #[test]
    fn test_closed_connection_maps_to_unavailable() {
        let err: ToolError = McpError::ServerUnavailable("stdout closed".into()).into();
        assert!(matches!(err, ToolError::Unavailable(_)));

        let err: ToolError = McpError::Rpc {
            code: -32603,
            message: "boom".into(),
        }
        .into();
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
    }
}
