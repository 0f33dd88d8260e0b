use crate::conversation::{Conversation, Turn};
use crate::gateway::{CompletionOptions, LlmError, ModelGateway};
use crate::registry::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The core agentic loop that orchestrates LLM ↔ Tool execution.
///
/// Flow: User → LLM → ToolCalls → Execute → Results → LLM → ... → Final Text
pub struct AgenticLoop {
    gateway: Arc<dyn ModelGateway>,
    registry: Arc<ToolRegistry>,
    max_rounds: usize,
    model_timeout: Duration,
    options: CompletionOptions,
}

impl AgenticLoop {
    pub fn new(gateway: Arc<dyn ModelGateway>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            gateway,
            registry,
            max_rounds: 10,
            model_timeout: Duration::from_secs(120),
            options: CompletionOptions::default(),
        }
    }

    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max;
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.options.max_tokens = max;
        self
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.options.system_prompt = prompt;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn backend_name(&self) -> &str {
        self.gateway.backend_name()
    }

    /// Run one user query to a final answer, appending every turn to
    /// `conversation`. Tool calls within a round run sequentially in
    /// request order.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        user_message: String,
    ) -> Result<(), AgenticLoopError> {
        conversation.push(Turn::user(user_message));
        let tools = self.registry.list();
        let mut rounds = 0;

        loop {
            debug!(round = rounds, turns = conversation.len(), "Calling model");
            let response = tokio::time::timeout(
                self.model_timeout,
                self.gateway
                    .complete(conversation.turns(), &tools, &self.options),
            )
            .await
            .map_err(|_| LlmError::Timeout(self.model_timeout))??;

            if response.is_final() {
                conversation.push(Turn::assistant(response.content));
                info!(rounds, conversation_id = %conversation.id(), "Agentic loop complete");
                return Ok(());
            }
            let tool_calls = response.tool_calls();

            if rounds >= self.max_rounds {
                warn!(max_rounds = self.max_rounds, "Model still requesting tools, giving up");
                return Err(AgenticLoopError::LoopExceeded(self.max_rounds));
            }
            rounds += 1;

            conversation.push(Turn::assistant(response.content));
            info!(count = tool_calls.len(), round = rounds, "Executing tool calls");
            for call in &tool_calls {
                let result = self.registry.dispatch(call).await;
                conversation.push(Turn::tool(result));
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgenticLoopError {
    #[error("LLM error: {0}")]
    LlmError(#[from] LlmError),
    #[error("Tool loop exceeded {0} rounds")]
    LoopExceeded(usize),
}
