//! Server startup: provider connections, registry aggregation and shared state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tracing::{error, info};

use chatbot_core::{Config, ProviderConfig};
use chatbot_mcp::{LaunchSpec, McpToolProvider};
use chatbot_tool_runtime::{
    AgenticLoop, ConversationLog, ModelGateway, SessionManager, ToolProvider, ToolRegistry,
};

use crate::state::AppState;

/// Bound on spawn + handshake for one provider.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Turns one provider entry from the configuration into a live provider.
#[async_trait]
pub trait ProviderConnector: Send + Sync {
    async fn connect(&self, config: &ProviderConfig) -> anyhow::Result<Arc<dyn ToolProvider>>;
}

/// Launches providers as MCP subprocesses.
pub struct McpConnector {
    pub handshake_timeout: Duration,
}

impl Default for McpConnector {
    fn default() -> Self {
        Self {
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }
}

#[async_trait]
impl ProviderConnector for McpConnector {
    async fn connect(&self, config: &ProviderConfig) -> anyhow::Result<Arc<dyn ToolProvider>> {
        let spec = LaunchSpec::resolve(config)?;
        info!(provider = %config.id, command = %spec.display(), "Launching MCP provider");

        let provider = tokio::time::timeout(
            self.handshake_timeout,
            McpToolProvider::launch(config.id.clone(), &spec),
        )
        .await
        .map_err(|_| {
            anyhow::anyhow!("handshake timed out after {:?}", self.handshake_timeout)
        })??;

        if let Some(name) = provider.server_name() {
            info!(provider = %config.id, server = name, "MCP handshake complete");
        }
        Ok(Arc::new(provider))
    }
}

/// Connect every launchable provider in configuration order and aggregate
/// their tools. A provider that fails to start is logged, recorded as
/// `Failed` and skipped; startup carries on with the rest.
pub async fn build_registry(config: &Config, connector: &dyn ProviderConnector) -> ToolRegistry {
    let launch = config.launch_providers();
    let mut registry = ToolRegistry::new().with_call_timeout(config.tools.timeout);

    for provider_config in &launch {
        match connector.connect(provider_config).await {
            Ok(provider) => registry.add_provider(provider).await,
            Err(e) => {
                error!(provider = %provider_config.id, error = %e, "Provider failed to start");
                registry.record_failure(&provider_config.id, e.to_string());
            }
        }
    }

    info!(
        "{} of {} providers connected, {} tools available",
        registry.connected_count(),
        launch.len(),
        registry.len()
    );
    registry
}

/// Assemble the shared state from a validated config, a model gateway and
/// an already-built registry.
pub fn build_app_state(
    config: Config,
    gateway: Arc<dyn ModelGateway>,
    registry: ToolRegistry,
) -> anyhow::Result<Arc<AppState>> {
    let registry = Arc::new(registry);

    let mut sessions = SessionManager::new(config.conversation.history);
    if config.conversation.log_enabled {
        let log = ConversationLog::new(&config.conversation.log_dir).with_context(|| {
            format!(
                "Failed to open conversation log dir {}",
                config.conversation.log_dir.display()
            )
        })?;
        info!(dir = %log.dir().display(), "Conversation log enabled");
        sessions = sessions.with_log(Arc::new(log));
    }

    let agentic_loop = AgenticLoop::new(gateway, Arc::clone(&registry))
        .with_max_rounds(config.tools.max_rounds)
        .with_model_timeout(config.llm.timeout)
        .with_max_tokens(config.llm.max_tokens)
        .with_system_prompt(config.llm.system_prompt.clone());

    Ok(Arc::new(AppState {
        config,
        registry,
        sessions,
        agentic_loop,
    }))
}
