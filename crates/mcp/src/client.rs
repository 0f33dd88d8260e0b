//! MCP client implementation.
//!
//! Connects to an MCP server (usually a spawned subprocess), performs the
//! initialize handshake, lists tools, and calls them.

use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::error::McpError;
use crate::launch::LaunchSpec;
use crate::transport::{ChildProcessTransport, McpTransport};
use crate::types::*;

/// Safety net against a server that keeps returning the same cursor.
const MAX_TOOL_PAGES: usize = 100;

/// An MCP client bound to one server connection.
///
/// Request/response exchanges are serialized: the transport stays locked
/// from sending a request until its response has been read.
pub struct McpClient {
    transport: Mutex<Box<dyn McpTransport>>,
    child: Mutex<Option<Child>>,
    next_id: AtomicI64,
    closed: AtomicBool,
    server_info: Option<ServerInfo>,
}

impl McpClient {
    /// Spawn an MCP server process and connect to it.
    ///
    /// stdin/stdout are piped for JSON-RPC; stderr is inherited so provider
    /// diagnostics land in our logs.
    pub async fn spawn(spec: &LaunchSpec) -> Result<Self, McpError> {
        tracing::info!(command = %spec.display(), "Spawning MCP server process");

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|source| McpError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            McpError::ServerUnavailable("Failed to capture server stdin".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            McpError::ServerUnavailable("Failed to capture server stdout".to_string())
        })?;

        let transport = Box::new(ChildProcessTransport::new(stdout, stdin));
        Self::connect_with_child(transport, Some(child)).await
    }

    /// Connect over an already-open transport and run the handshake.
    pub async fn connect(transport: Box<dyn McpTransport>) -> Result<Self, McpError> {
        Self::connect_with_child(transport, None).await
    }

    async fn connect_with_child(
        transport: Box<dyn McpTransport>,
        child: Option<Child>,
    ) -> Result<Self, McpError> {
        let mut client = Self {
            transport: Mutex::new(transport),
            child: Mutex::new(child),
            next_id: AtomicI64::new(1),
            closed: AtomicBool::new(false),
            server_info: None,
        };

        if let Err(e) = client.initialize().await {
            client.shutdown().await;
            return Err(e);
        }
        Ok(client)
    }

    /// Perform MCP initialization handshake.
    async fn initialize(&mut self) -> Result<(), McpError> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "chatbot-mcp-client",
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let result = self.request("initialize", Some(params)).await?;
        let init: InitializeResult = serde_json::from_value(result)?;
        if init.protocol_version != PROTOCOL_VERSION {
            // Servers may answer with a newer revision; the subset we use is stable.
            tracing::debug!(server_version = %init.protocol_version, "Protocol version differs");
        }

        self.notify("notifications/initialized", None).await?;

        tracing::info!(
            server = %init.server_info.name,
            version = init.server_info.version.as_deref().unwrap_or("unknown"),
            "MCP client initialized"
        );
        self.server_info = Some(init.server_info);
        Ok(())
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// True once the server's stdout has closed or `shutdown` ran.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send a JSON-RPC request and wait for the response carrying its id.
    ///
    /// Notifications and stale responses arriving in between are skipped.
    /// Server-initiated requests are answered inline (`ping`) or refused.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        if self.is_closed() {
            return Err(McpError::ServerUnavailable("connection closed".to_string()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(RpcId::Number(id), method, params);
        let json = serde_json::to_string(&request)?;

        let mut transport = self.transport.lock().await;
        tracing::debug!(method = %method, id = %id, "Sending request");
        if let Err(e) = transport.send(&json).await {
            self.closed.store(true, Ordering::SeqCst);
            return Err(McpError::ServerUnavailable(e.to_string()));
        }

        let expected = Value::from(id);
        loop {
            let line = match transport.receive().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    self.closed.store(true, Ordering::SeqCst);
                    tracing::warn!(method = %method, "MCP server closed its output");
                    return Err(McpError::ServerUnavailable(
                        "server closed the connection".to_string(),
                    ));
                }
                Err(e) => {
                    self.closed.store(true, Ordering::SeqCst);
                    return Err(McpError::ServerUnavailable(e.to_string()));
                }
            };

            let raw: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unparseable line from MCP server");
                    continue;
                }
            };

            if let Some(server_method) = raw.get("method").and_then(Value::as_str) {
                match raw.get("id") {
                    Some(server_id) => {
                        let reply = server_request_reply(server_id, server_method);
                        transport.send(&serde_json::to_string(&reply)?).await?;
                    }
                    None => {
                        tracing::debug!(method = %server_method, "Server notification");
                    }
                }
                continue;
            }

            let response_id = raw.get("id").cloned().unwrap_or(Value::Null);
            if response_id != expected {
                // A null id carrying an error is the server rejecting what we sent.
                if response_id.is_null() {
                    if let Some(error) = raw.get("error") {
                        let error: JsonRpcError = serde_json::from_value(error.clone())?;
                        return Err(McpError::Rpc {
                            code: error.code,
                            message: error.message,
                        });
                    }
                }
                tracing::debug!(id = %response_id, expected = id, "Skipping unrelated response");
                continue;
            }

            let response: JsonRpcResponse = serde_json::from_value(raw)?;
            if let Some(error) = response.error {
                return Err(McpError::Rpc {
                    code: error.code,
                    message: error.message,
                });
            }
            return Ok(response.result.unwrap_or(Value::Null));
        }
    }

    /// Send a JSON-RPC notification (no response expected).
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let notif = JsonRpcNotification::new(method, params);
        let json = serde_json::to_string(&notif)?;

        let mut transport = self.transport.lock().await;
        transport.send(&json).await
    }

    /// List every tool, following `nextCursor` pagination.
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_TOOL_PAGES {
            let params = cursor
                .as_ref()
                .map(|c| serde_json::json!({ "cursor": c }));
            let result: ListToolsResult =
                serde_json::from_value(self.request("tools/list", params).await?)?;
            tools.extend(result.tools);

            match result.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => {
                    tracing::info!(count = tools.len(), "Tool discovery complete");
                    return Ok(tools);
                }
            }
        }

        tracing::warn!(pages = MAX_TOOL_PAGES, "Stopped following tools/list cursor");
        Ok(tools)
    }

    /// Call a tool on the remote MCP server.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });

        let result = self.request("tools/call", Some(params)).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Stop the MCP server process (if any) and refuse further requests.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(mut child) = self.child.lock().await.take() {
            tracing::info!(pid = ?child.id(), "Shutting down MCP server process");
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "Failed to kill MCP server process");
            }
        }
    }
}

fn server_request_reply(id: &Value, method: &str) -> JsonRpcResponse {
    let id = serde_json::from_value::<RpcId>(id.clone()).unwrap_or(RpcId::Number(0));
    if method == "ping" {
        JsonRpcResponse::success(id, serde_json::json!({}))
    } else {
        tracing::debug!(method = %method, "Refusing server request");
        JsonRpcResponse::error(
            id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use serde_json::json;

    /// Reads one message from the server side and parses it.
    async fn next_request(server: &mut ChannelTransport) -> Value {
        let line = server.receive().await.unwrap().unwrap();
        serde_json::from_str(&line).unwrap()
    }

    async fn reply(server: &mut ChannelTransport, id: &Value, result: Value) {
        let msg = json!({"jsonrpc": "2.0", "id": id, "result": result});
        server.send(&msg.to_string()).await.unwrap();
    }

    async fn handshake(server: &mut ChannelTransport) {
        let init = next_request(server).await;
        assert_eq!(init["method"], "initialize");
        assert_eq!(init["params"]["protocolVersion"], PROTOCOL_VERSION);
        reply(
            server,
            &init["id"],
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "fake", "version": "1.0"}
            }),
        )
        .await;
        let initialized = next_request(server).await;
        assert_eq!(initialized["method"], "notifications/initialized");
        assert!(initialized.get("id").is_none());
    }

    #[tokio::test]
    async fn test_handshake_and_paginated_listing() {
        let (client_side, mut server) = ChannelTransport::pair();
        let fake = tokio::spawn(async move {
            handshake(&mut server).await;

            let page1 = next_request(&mut server).await;
            assert!(page1.get("params").is_none());
            reply(
                &mut server,
                &page1["id"],
                json!({"tools": [{"name": "a", "inputSchema": {"type": "object"}}], "nextCursor": "p2"}),
            )
            .await;

            let page2 = next_request(&mut server).await;
            assert_eq!(page2["params"]["cursor"], "p2");
            reply(&mut server, &page2["id"], json!({"tools": [{"name": "b"}]})).await;
            server
        });

        let client = McpClient::connect(Box::new(client_side)).await.unwrap();
        assert_eq!(client.server_info().unwrap().name, "fake");
        let tools = client.list_tools().await.unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        fake.await.unwrap();
    }

    #[tokio::test]
    async fn test_skips_notifications_and_answers_ping() {
        let (client_side, mut server) = ChannelTransport::pair();
        let fake = tokio::spawn(async move {
            handshake(&mut server).await;

            let call = next_request(&mut server).await;
            assert_eq!(call["method"], "tools/call");
            assert_eq!(call["params"]["name"], "echo");

            server
                .send(r#"{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info"}}"#)
                .await
                .unwrap();
            server
                .send(r#"{"jsonrpc":"2.0","id":"srv-1","method":"ping"}"#)
                .await
                .unwrap();
            let pong = next_request(&mut server).await;
            assert_eq!(pong["id"], "srv-1");
            assert_eq!(pong["result"], json!({}));

            // Stale id first, then the real answer.
            reply(&mut server, &json!(999), json!({"content": []})).await;
            reply(
                &mut server,
                &call["id"],
                json!({"content": [{"type": "text", "text": "pong"}]}),
            )
            .await;
            server
        });

        let client = McpClient::connect(Box::new(client_side)).await.unwrap();
        let result = client
            .call_tool("echo", json!({"message": "pong"}))
            .await
            .unwrap();
        assert_eq!(result.to_text(), "pong");
        fake.await.unwrap();
    }

    #[tokio::test]
    async fn test_rpc_error_is_surfaced() {
        let (client_side, mut server) = ChannelTransport::pair();
        let fake = tokio::spawn(async move {
            handshake(&mut server).await;
            let call = next_request(&mut server).await;
            let msg = json!({
                "jsonrpc": "2.0",
                "id": call["id"],
                "error": {"code": -32602, "message": "Unknown tool: nope"}
            });
            server.send(&msg.to_string()).await.unwrap();
            server
        });

        let client = McpClient::connect(Box::new(client_side)).await.unwrap();
        let err = client.call_tool("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, McpError::Rpc { code: -32602, .. }));
        fake.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_server_marks_client_closed() {
        let (client_side, mut server) = ChannelTransport::pair();
        let fake = tokio::spawn(async move {
            handshake(&mut server).await;
            let _call = next_request(&mut server).await;
            drop(server);
        });

        let client = McpClient::connect(Box::new(client_side)).await.unwrap();
        let err = client.call_tool("echo", json!({})).await.unwrap_err();
        assert!(matches!(err, McpError::ServerUnavailable(_)));
        assert!(client.is_closed());
        fake.await.unwrap();

        let err = client.list_tools().await.unwrap_err();
        assert!(matches!(err, McpError::ServerUnavailable(_)));
    }

    #[tokio::test]
    async fn test_spawn_missing_program() {
        let err = McpClient::spawn(&LaunchSpec::new("/definitely/not/a/real/mcp-server"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, McpError::Spawn { .. }));
    }
}
