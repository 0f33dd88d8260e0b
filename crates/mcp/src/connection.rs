//! A connected MCP server exposed as a [`ToolProvider`].

use async_trait::async_trait;

use chatbot_tool_runtime::{ProviderStatus, ToolCall, ToolDefinition, ToolError, ToolProvider, ToolResult};

use crate::client::McpClient;
use crate::error::McpError;
use crate::launch::LaunchSpec;
use crate::transport::McpTransport;

/// One provider subprocess: handshake done, tool list fetched at connect time.
pub struct McpToolProvider {
    id: String,
    client: McpClient,
    tools: Vec<ToolDefinition>,
}

impl McpToolProvider {
    /// Spawn the provider, run the handshake and list its tools.
    pub async fn launch(id: impl Into<String>, spec: &LaunchSpec) -> Result<Self, McpError> {
        let client = McpClient::spawn(spec).await?;
        Self::from_client(id, client).await
    }

    /// Wrap an already-open transport (in-process servers, tests).
    pub async fn connect(
        id: impl Into<String>,
        transport: Box<dyn McpTransport>,
    ) -> Result<Self, McpError> {
        let client = McpClient::connect(transport).await?;
        Self::from_client(id, client).await
    }

    async fn from_client(id: impl Into<String>, client: McpClient) -> Result<Self, McpError> {
        let id = id.into();
        let tools = match client.list_tools().await {
            Ok(infos) => infos.into_iter().map(ToolDefinition::from).collect::<Vec<_>>(),
            Err(e) => {
                client.shutdown().await;
                return Err(e);
            }
        };
        tracing::info!(provider = %id, tools = tools.len(), "MCP provider connected");
        Ok(Self { id, client, tools })
    }

    /// Name the server reported during `initialize`.
    pub fn server_name(&self) -> Option<&str> {
        self.client.server_info().map(|info| info.name.as_str())
    }
}

#[async_trait]
impl ToolProvider for McpToolProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ToolError> {
        Ok(self.tools.clone())
    }

    async fn invoke(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let raw = self
            .client
            .call_tool(&call.name, call.input.clone())
            .await
            .map_err(|e| {
                tracing::warn!(provider = %self.id, tool = %call.name, error = %e, "MCP tool call failed");
                ToolError::from(e)
            })?;

        Ok(ToolResult {
            tool_call_id: call.id.clone(),
            content: raw.to_text(),
            is_error: raw.is_error,
            structured: serde_json::to_value(&raw).ok(),
        })
    }

    fn status(&self) -> ProviderStatus {
        if self.client.is_closed() {
            ProviderStatus::Disconnected
        } else {
            ProviderStatus::Connected
        }
    }

    async fn shutdown(&self) {
        self.client.shutdown().await;
    }
}
