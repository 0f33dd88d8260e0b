use crate::provider::{ProviderStatus, ToolProvider};
use crate::tool::{ToolCall, ToolDefinition, ToolError, ToolResult};
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Aggregated tool namespace across every connected provider.
///
/// Tool names are unique: when two providers offer the same name, the
/// provider aggregated first keeps it and the later one is recorded as a
/// [`ToolCollision`]. Routing is a plain lookup of the owning provider.
pub struct ToolRegistry {
    tools: IndexMap<String, RegisteredTool>,
    providers: Vec<ProviderEntry>,
    collisions: Vec<ToolCollision>,
    call_timeout: Duration,
}

struct RegisteredTool {
    definition: ToolDefinition,
    /// Index into `providers`
    owner: usize,
}

struct ProviderEntry {
    id: String,
    provider: Option<Arc<dyn ToolProvider>>,
    tool_count: usize,
    failure: Option<String>,
}

/// A tool name offered by more than one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCollision {
    pub tool: String,
    /// Provider that owns the name
    pub kept: String,
    /// Provider whose duplicate was skipped
    pub skipped: String,
}

/// Per-provider line of the startup/health report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderSummary {
    pub id: String,
    pub status: ProviderStatus,
    pub tool_count: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
    #[error("Provider '{provider}' failed: {source}")]
    Provider {
        provider: String,
        #[source]
        source: ToolError,
    },
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: IndexMap::new(),
            providers: Vec::new(),
            collisions: Vec::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Build a registry from providers in configuration order.
    pub async fn aggregate(providers: Vec<Arc<dyn ToolProvider>>, call_timeout: Duration) -> Self {
        let mut registry = Self::new().with_call_timeout(call_timeout);
        for provider in providers {
            registry.add_provider(provider).await;
        }
        registry
    }

    /// Query a provider for its tools and merge them into the namespace.
    /// A provider whose listing fails is kept as `Failed` with no tools.
    pub async fn add_provider(&mut self, provider: Arc<dyn ToolProvider>) {
        let id = provider.id().to_string();
        let definitions = match provider.list_tools().await {
            Ok(defs) => defs,
            Err(e) => {
                warn!(provider = %id, error = %e, "Tool listing failed, provider excluded");
                provider.shutdown().await;
                self.record_failure(&id, e.to_string());
                return;
            }
        };

        let owner = self.providers.len();
        let mut registered = 0;
        for definition in definitions {
            if let Some(existing) = self.tools.get(&definition.name) {
                let kept = self.providers[existing.owner].id.clone();
                warn!(
                    tool = %definition.name,
                    kept = %kept,
                    skipped = %id,
                    "Duplicate tool name, keeping first registration"
                );
                self.collisions.push(ToolCollision {
                    tool: definition.name,
                    kept,
                    skipped: id.clone(),
                });
                continue;
            }
            debug!(provider = %id, tool = %definition.name, "Registered tool");
            self.tools
                .insert(definition.name.clone(), RegisteredTool { definition, owner });
            registered += 1;
        }

        info!(provider = %id, tools = registered, "Provider aggregated");
        self.providers.push(ProviderEntry {
            id,
            provider: Some(provider),
            tool_count: registered,
            failure: None,
        });
    }

    /// Record a provider that never connected so it shows up in status reports.
    pub fn record_failure(&mut self, id: &str, reason: impl Into<String>) {
        self.providers.push(ProviderEntry {
            id: id.to_string(),
            provider: None,
            tool_count: 0,
            failure: Some(reason.into()),
        });
    }

    /// All tool definitions, in registration order (for sending to the LLM).
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name).map(|t| &t.definition)
    }

    /// Id of the provider that owns `name`.
    pub fn owner(&self, name: &str) -> Option<&str> {
        self.tools
            .get(name)
            .map(|t| self.providers[t.owner].id.as_str())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn collisions(&self) -> &[ToolCollision] {
        &self.collisions
    }

    pub fn provider_statuses(&self) -> Vec<ProviderSummary> {
        self.providers
            .iter()
            .map(|entry| ProviderSummary {
                id: entry.id.clone(),
                status: match (&entry.provider, &entry.failure) {
                    (_, Some(reason)) => ProviderStatus::Failed {
                        reason: reason.clone(),
                    },
                    (Some(provider), None) => provider.status(),
                    (None, None) => ProviderStatus::Disconnected,
                },
                tool_count: entry.tool_count,
            })
            .collect()
    }

    pub fn connected_count(&self) -> usize {
        self.provider_statuses()
            .iter()
            .filter(|s| s.status.is_connected())
            .count()
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Route a call to the provider owning its tool name.
    pub async fn invoke(&self, call: &ToolCall) -> Result<ToolResult, RouterError> {
        let registered = self
            .tools
            .get(&call.name)
            .ok_or_else(|| RouterError::ToolNotFound(call.name.clone()))?;
        let entry = &self.providers[registered.owner];
        let provider = entry
            .provider
            .as_ref()
            .ok_or_else(|| RouterError::ToolNotFound(call.name.clone()))?;

        debug!(tool = %call.name, provider = %entry.id, call_id = %call.id, "Routing tool call");
        let outcome = tokio::time::timeout(self.call_timeout, provider.invoke(call))
            .await
            .unwrap_or(Err(ToolError::Timeout(self.call_timeout)));

        match outcome {
            Ok(mut result) => {
                result.tool_call_id = call.id.clone();
                Ok(result)
            }
            Err(source) => Err(RouterError::Provider {
                provider: entry.id.clone(),
                source,
            }),
        }
    }

    /// Like [`invoke`](Self::invoke), but folds every failure into an error
    /// result so the conversation can carry on.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        match self.invoke(call).await {
            Ok(result) => result,
            Err(RouterError::ToolNotFound(name)) => {
                warn!(tool = %name, "Model requested unknown tool");
                ToolResult::error(&call.id, format!("Unknown tool: {}", name))
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                ToolResult::error(&call.id, format!("Tool error: {}", e))
            }
        }
    }

    /// Shut every provider down. Called once at process exit.
    pub async fn shutdown(&self) {
        for entry in &self.providers {
            if let Some(provider) = &entry.provider {
                debug!(provider = %entry.id, "Shutting down provider");
                provider.shutdown().await;
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::LocalToolProvider;
    use crate::tool::testing::{FailingTool, SlowTool, StaticTool};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn call(name: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            input: json!({}),
        }
    }

    #[tokio::test]
    async fn test_union_and_routing() {
        let a = StaticTool::new("a", "from p1");
        let a_calls = a.counter();
        let p1 = LocalToolProvider::new("p1")
            .with_tool(a)
            .unwrap()
            .with_tool(StaticTool::new("b", "b"))
            .unwrap();
        let c = StaticTool::new("c", "from p2");
        let c_calls = c.counter();
        let p2 = LocalToolProvider::new("p2").with_tool(c).unwrap();

        let registry = ToolRegistry::aggregate(
            vec![Arc::new(p1), Arc::new(p2)],
            Duration::from_secs(5),
        )
        .await;

        let names: Vec<_> = registry.list().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(registry.owner("a"), Some("p1"));
        assert_eq!(registry.owner("c"), Some("p2"));

        let result = registry.invoke(&call("a")).await.unwrap();
        assert_eq!(result.content, "from p1");
        assert_eq!(result.tool_call_id, "call_1");
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_first_registered_wins() {
        let p1 = LocalToolProvider::new("p1")
            .with_tool(StaticTool::new("search", "p1"))
            .unwrap();
        let p2 = LocalToolProvider::new("p2")
            .with_tool(StaticTool::new("search", "p2"))
            .unwrap()
            .with_tool(StaticTool::new("other", "p2"))
            .unwrap();

        let registry = ToolRegistry::aggregate(
            vec![Arc::new(p1), Arc::new(p2)],
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.owner("search"), Some("p1"));
        assert_eq!(
            registry.collisions(),
            &[ToolCollision {
                tool: "search".to_string(),
                kept: "p1".to_string(),
                skipped: "p2".to_string(),
            }]
        );
        let result = registry.invoke(&call("search")).await.unwrap();
        assert_eq!(result.content, "p1");

        let statuses = registry.provider_statuses();
        assert_eq!(statuses[1].tool_count, 1);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry.invoke(&call("nope")).await.unwrap_err();
        assert!(matches!(err, RouterError::ToolNotFound(name) if name == "nope"));

        let result = registry.dispatch(&call("nope")).await;
        assert!(result.is_error);
        assert_eq!(result.tool_call_id, "call_1");
        assert!(result.content.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_error_result() {
        let p = LocalToolProvider::new("p")
            .with_tool(FailingTool("broken".to_string()))
            .unwrap();
        let registry = ToolRegistry::aggregate(vec![Arc::new(p)], Duration::from_secs(5)).await;

        let err = registry.invoke(&call("broken")).await.unwrap_err();
        assert!(matches!(err, RouterError::Provider { ref provider, .. } if provider == "p"));

        let result = registry.dispatch(&call("broken")).await;
        assert!(result.is_error);
        assert!(result.content.contains("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout() {
        let p = LocalToolProvider::new("p")
            .with_tool(SlowTool("slow".to_string()))
            .unwrap();
        let registry =
            ToolRegistry::aggregate(vec![Arc::new(p)], Duration::from_millis(50)).await;

        let err = registry.invoke(&call("slow")).await.unwrap_err();
        assert!(matches!(
            err,
            RouterError::Provider {
                source: ToolError::Timeout(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_failed_provider_in_statuses() {
        let mut registry = ToolRegistry::new();
        registry
            .add_provider(Arc::new(
                LocalToolProvider::new("ok").with_tool(StaticTool::new("x", "x")).unwrap(),
            ))
            .await;
        registry.record_failure("github", "spawn failed: not found");

        let statuses = registry.provider_statuses();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].status, ProviderStatus::Connected);
        assert_eq!(
            statuses[1].status,
            ProviderStatus::Failed {
                reason: "spawn failed: not found".to_string()
            }
        );
        assert_eq!(registry.connected_count(), 1);
        assert_eq!(registry.provider_count(), 2);
    }

    #[tokio::test]
    async fn test_rebuild_without_provider_removes_only_its_tools() {
        let build = |include_second: bool| async move {
            let mut providers: Vec<Arc<dyn ToolProvider>> = vec![Arc::new(
                LocalToolProvider::new("p1")
                    .with_tool(StaticTool::new("a", "a"))
                    .unwrap(),
            )];
            if include_second {
                providers.push(Arc::new(
                    LocalToolProvider::new("p2")
                        .with_tool(StaticTool::new("c", "c"))
                        .unwrap(),
                ));
            }
            ToolRegistry::aggregate(providers, Duration::from_secs(5)).await
        };

        let full = build(true).await;
        assert_eq!(full.len(), 2);

        let reduced = build(false).await;
        let names: Vec<_> = reduced.list().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["a"]);
    }
}
