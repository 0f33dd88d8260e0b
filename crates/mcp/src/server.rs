//! MCP server implementation.
//!
//! Exposes any in-process `ToolProvider` over the MCP protocol.
//! Handles JSON-RPC requests and dispatches them to the appropriate handlers.

use serde_json::Value;
use std::sync::Arc;

use chatbot_tool_runtime::{ToolCall, ToolError, ToolProvider};

use crate::error::McpError;
use crate::transport::McpTransport;
use crate::types::*;

/// MCP server that bridges a `ToolProvider` to MCP clients.
pub struct McpServer {
    provider: Arc<dyn ToolProvider>,
    server_name: String,
    server_version: String,
    initialized: bool,
    next_call: u64,
}

impl McpServer {
    /// Create a new MCP server serving the given provider's tools.
    pub fn new(provider: Arc<dyn ToolProvider>) -> Self {
        Self {
            provider,
            server_name: "chatbot-mcp".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            initialized: false,
            next_call: 0,
        }
    }

    /// Set the server name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    /// Whether a client has completed `initialize`.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Run the server loop, reading from and writing to the transport.
    ///
    /// Processes JSON-RPC requests until the transport is closed.
    pub async fn run<T: McpTransport>(&mut self, transport: &mut T) -> Result<(), McpError> {
        tracing::info!(server = %self.server_name, "MCP server starting");

        loop {
            let line = match transport.receive().await? {
                Some(line) => line,
                None => {
                    tracing::info!("Transport closed, shutting down");
                    break;
                }
            };

            tracing::debug!(message = %line, "Received message");

            // Distinguish requests (have "id") from notifications (no "id")
            // by parsing as generic Value first.
            let raw: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to parse JSON");
                    let resp = JsonRpcResponse {
                        jsonrpc: "2.0".to_string(),
                        id: RpcId::Number(0),
                        result: None,
                        error: Some(McpError::JsonParse(e).to_rpc_error()),
                    };
                    let json = serde_json::to_string(&resp)?;
                    transport.send(&json).await?;
                    continue;
                }
            };

            // If no "id" field, treat as notification
            if raw.get("id").is_none() {
                if let Ok(notif) = serde_json::from_value::<JsonRpcNotification>(raw) {
                    self.handle_notification(&notif);
                }
                continue;
            }

            // Parse as a request
            let request: JsonRpcRequest = match serde_json::from_value(raw) {
                Ok(req) => req,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to parse JSON-RPC request");
                    let resp = JsonRpcResponse {
                        jsonrpc: "2.0".to_string(),
                        id: RpcId::Number(0),
                        result: None,
                        error: Some(McpError::JsonParse(e).to_rpc_error()),
                    };
                    let json = serde_json::to_string(&resp)?;
                    transport.send(&json).await?;
                    continue;
                }
            };

            let response = self.handle_request(&request).await;
            let json = serde_json::to_string(&response)?;
            tracing::debug!(response = %json, "Sending response");
            transport.send(&json).await?;
        }

        Ok(())
    }

    /// Handle a single JSON-RPC request and produce a response.
    pub async fn handle_request(&mut self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id, &request.params),
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            "tools/list" => self.handle_list_tools(id).await,
            "tools/call" => self.handle_call_tool(id, &request.params).await,
            method => {
                tracing::warn!(method = %method, "Unknown method");
                let err = McpError::MethodNotFound(method.to_string());
                JsonRpcResponse::error(id, err.to_rpc_error().code, err.to_string())
            }
        }
    }

    fn handle_notification(&mut self, notif: &JsonRpcNotification) {
        match notif.method.as_str() {
            "notifications/initialized" => {
                tracing::info!("Client confirmed initialization");
            }
            "notifications/cancelled" => {
                tracing::debug!("Client cancelled a request");
            }
            method => {
                tracing::debug!(method = %method, "Unknown notification, ignoring");
            }
        }
    }

    fn handle_initialize(&mut self, id: RpcId, params: &Option<Value>) -> JsonRpcResponse {
        let client = params
            .as_ref()
            .and_then(|p| serde_json::from_value::<InitializeParams>(p.clone()).ok());
        match &client {
            Some(p) => tracing::info!(
                client = %p.client_info.name,
                protocol = %p.protocol_version,
                "Handling initialize"
            ),
            None => tracing::info!("Handling initialize"),
        }
        self.initialized = true;

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
            },
            server_info: ServerInfo {
                name: self.server_name.clone(),
                version: Some(self.server_version.clone()),
            },
        };

        match serde_json::to_value(result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                let err = McpError::JsonParse(e);
                JsonRpcResponse::error(id, err.to_rpc_error().code, err.to_string())
            }
        }
    }

    async fn handle_list_tools(&self, id: RpcId) -> JsonRpcResponse {
        tracing::debug!("Handling tools/list");

        let tools: Vec<ToolInfo> = match self.provider.list_tools().await {
            Ok(defs) => defs.into_iter().map(ToolInfo::from).collect(),
            Err(e) => {
                let err = McpError::ToolExecution(e.to_string());
                return JsonRpcResponse::error(id, err.to_rpc_error().code, err.to_string());
            }
        };
        let result = ListToolsResult {
            tools,
            next_cursor: None,
        };

        match serde_json::to_value(result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                let err = McpError::JsonParse(e);
                JsonRpcResponse::error(id, err.to_rpc_error().code, err.to_string())
            }
        }
    }

    async fn handle_call_tool(&mut self, id: RpcId, params: &Option<Value>) -> JsonRpcResponse {
        let params = match params {
            Some(p) => p,
            None => {
                let err = McpError::InvalidParams("missing params".to_string());
                return JsonRpcResponse::error(id, err.to_rpc_error().code, err.to_string());
            }
        };

        let call_params: CallToolParams = match serde_json::from_value(params.clone()) {
            Ok(p) => p,
            Err(e) => {
                let err = McpError::InvalidParams(e.to_string());
                return JsonRpcResponse::error(id, err.to_rpc_error().code, err.to_string());
            }
        };

        tracing::debug!(tool = %call_params.name, "Handling tools/call");

        self.next_call += 1;
        let call = ToolCall {
            id: format!("mcp-{}", self.next_call),
            name: call_params.name,
            input: call_params.arguments,
        };

        let result = match self.provider.invoke(&call).await {
            Ok(tool_result) => CallToolResult::text(tool_result.content, tool_result.is_error),
            Err(ToolError::NotFound(name)) => {
                let err = McpError::ToolNotFound(name);
                return JsonRpcResponse::error(id, err.to_rpc_error().code, err.to_string());
            }
            Err(e) => CallToolResult::text(e.to_string(), true),
        };

        match serde_json::to_value(result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                let err = McpError::JsonParse(e);
                JsonRpcResponse::error(id, err.to_rpc_error().code, err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use chatbot_tool_runtime::{EchoTool, LocalToolProvider};

    fn test_server() -> McpServer {
        let provider = LocalToolProvider::new("local").with_tool(EchoTool).unwrap();
        McpServer::new(Arc::new(provider))
    }

    #[tokio::test]
    async fn test_handle_initialize() {
        let mut server = test_server();
        let req = JsonRpcRequest::new(
            RpcId::Number(1),
            "initialize",
            Some(serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {"name": "test-client"}
            })),
        );

        let resp = server.handle_request(&req).await;
        assert!(resp.error.is_none());
        let result: InitializeResult =
            serde_json::from_value(resp.result.unwrap()).unwrap();
        assert_eq!(result.protocol_version, PROTOCOL_VERSION);
        assert_eq!(result.server_info.name, "chatbot-mcp");
        assert!(server.is_initialized());
    }

    #[tokio::test]
    async fn test_handle_list_tools() {
        let mut server = test_server();
        let req = JsonRpcRequest::new(RpcId::Number(2), "tools/list", None);

        let resp = server.handle_request(&req).await;
        assert!(resp.error.is_none());
        let result: ListToolsResult =
            serde_json::from_value(resp.result.unwrap()).unwrap();
        assert_eq!(result.tools.len(), 1);
        assert_eq!(result.tools[0].name, "echo");
        assert!(result.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_handle_call_tool() {
        let mut server = test_server();
        let req = JsonRpcRequest::new(
            RpcId::Number(3),
            "tools/call",
            Some(serde_json::json!({
                "name": "echo",
                "arguments": {"message": "hello mcp"}
            })),
        );

        let resp = server.handle_request(&req).await;
        assert!(resp.error.is_none());
        let result: CallToolResult =
            serde_json::from_value(resp.result.unwrap()).unwrap();
        assert!(!result.is_error);
        assert_eq!(result.content, vec![ToolContent::Text { text: "hello mcp".to_string() }]);
    }

    #[tokio::test]
    async fn test_handle_call_tool_not_found() {
        let mut server = test_server();
        let req = JsonRpcRequest::new(
            RpcId::Number(4),
            "tools/call",
            Some(serde_json::json!({
                "name": "nonexistent",
                "arguments": {}
            })),
        );

        let resp = server.handle_request(&req).await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, error_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_handle_ping_and_unknown_method() {
        let mut server = test_server();
        let ping = server
            .handle_request(&JsonRpcRequest::new(RpcId::Number(5), "ping", None))
            .await;
        assert_eq!(ping.result, Some(serde_json::json!({})));

        let resp = server
            .handle_request(&JsonRpcRequest::new(RpcId::Number(6), "resources/list", None))
            .await;
        assert_eq!(resp.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_server_run_with_channel_transport() {
        let (mut client_side, mut server_side) = ChannelTransport::pair();
        let mut server = test_server();

        let server_handle = tokio::spawn(async move {
            server.run(&mut server_side).await
        });

        // Notifications get no reply; the next line must answer the request.
        client_side
            .send(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await
            .unwrap();

        let call_req = JsonRpcRequest::new(
            RpcId::String("c-1".to_string()),
            "tools/call",
            Some(serde_json::json!({
                "name": "echo",
                "arguments": {"message": "via transport"}
            })),
        );
        client_side
            .send(&serde_json::to_string(&call_req).unwrap())
            .await
            .unwrap();

        let resp_line = client_side.receive().await.unwrap().unwrap();
        let resp: JsonRpcResponse = serde_json::from_str(&resp_line).unwrap();
        assert_eq!(resp.id, RpcId::String("c-1".to_string()));
        let result: CallToolResult =
            serde_json::from_value(resp.result.unwrap()).unwrap();
        assert_eq!(result.to_text(), "via transport");

        drop(client_side);
        server_handle.await.unwrap().unwrap();
    }
}
