//! Bounded exponential backoff for throttled model calls.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tracing::warn;

use chatbot_tool_runtime::{CompletionOptions, LlmError, ModelGateway, ModelResponse, ToolDefinition, Turn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based): base × 2^(retry-1), capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Wraps a gateway and retries transient failures (throttling only).
pub struct RetryingGateway {
    inner: Arc<dyn ModelGateway>,
    policy: RetryPolicy,
}

impl RetryingGateway {
    pub fn new(inner: Arc<dyn ModelGateway>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl ModelGateway for RetryingGateway {
    async fn complete(
        &self,
        turns: &[Turn],
        tools: &[ToolDefinition],
        options: &CompletionOptions,
    ) -> Result<ModelResponse, LlmError> {
        let mut attempt = 1;
        loop {
            match self.inner.complete(turns, tools, options).await {
                Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                    // Jitter without rand: nanosecond fraction of the current time
                    let jitter_ms = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .unwrap_or_default()
                        .subsec_nanos()
                        % 100;
                    let delay = self.policy.delay_for(attempt) + Duration::from_millis(jitter_ms as u64);
                    warn!(
                        backend = self.inner.backend_name(),
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Model call throttled, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn backend_name(&self) -> &str {
        self.inner.backend_name()
    }
}
