use crate::tool::{Tool, ToolCall, ToolDefinition, ToolError, ToolResult};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Liveness of a tool provider connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProviderStatus {
    Connected,
    Disconnected,
    Failed { reason: String },
}

impl ProviderStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ProviderStatus::Connected)
    }
}

/// A source of named tools: an MCP subprocess, or an in-process tool set.
///
/// This trait lives in tool-runtime because the router consumes it.
/// The MCP implementation lives in crates/mcp.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Stable identifier from configuration (e.g., "github").
    fn id(&self) -> &str;

    /// Tools currently offered by this provider.
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ToolError>;

    /// Execute one call. The returned result's `tool_call_id` may be left
    /// empty; the router fills it in.
    async fn invoke(&self, call: &ToolCall) -> Result<ToolResult, ToolError>;

    fn status(&self) -> ProviderStatus {
        ProviderStatus::Connected
    }

    /// Release the underlying resources (kill the child process, close pipes).
    async fn shutdown(&self) {}
}

/// Serves a fixed set of in-process tools.
pub struct LocalToolProvider {
    id: String,
    tools: IndexMap<String, Arc<dyn Tool>>,
}

impl LocalToolProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tools: IndexMap::new(),
        }
    }

    /// Register a tool. Returns error if name already registered.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), ToolError> {
        let def = tool.definition();
        if self.tools.contains_key(&def.name) {
            return Err(ToolError::InvalidInput(format!(
                "tool '{}' is already registered with provider '{}'",
                def.name, self.id
            )));
        }
        self.tools.insert(def.name, Arc::new(tool));
        Ok(())
    }

    /// Builder form of [`register`](Self::register) for tests and fixtures.
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Result<Self, ToolError> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolProvider for LocalToolProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ToolError> {
        Ok(self.tools.values().map(|t| t.definition()).collect())
    }

    async fn invoke(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let mut result = tool.execute(call.input.clone()).await?;
        result.tool_call_id = call.id.clone();
        Ok(result)
    }
}
