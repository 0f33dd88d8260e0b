use crate::conversation::{ContentBlock, Turn};
use crate::tool::{ToolCall, ToolDefinition};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Trait for model backends that accept a transcript plus tool definitions.
///
/// Defined here by the consumer (the agentic loop); implementations for the
/// direct API and Bedrock live in crates/llm.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn complete(
        &self,
        turns: &[Turn],
        tools: &[ToolDefinition],
        options: &CompletionOptions,
    ) -> Result<ModelResponse, LlmError>;

    /// Backend name for logging/debugging (e.g., "anthropic", "bedrock")
    fn backend_name(&self) -> &str;
}

/// Per-call generation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub system_prompt: Option<String>,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_tokens: 8192,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

/// A complete model reply: text and/or tool-use blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            stop_reason: StopReason::EndTurn,
        }
    }

    /// Tool-use requests in the reply. Empty means the reply is final.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn is_final(&self) -> bool {
        !self
            .content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolUse { .. }))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Throttled: {0}")]
    Throttled(String),
    #[error("Model unavailable: {0}")]
    Unavailable(String),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Backend not configured: {0}")]
    NotConfigured(String),
}

impl LlmError {
    /// Classify an HTTP status from the model API.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => LlmError::Auth(message),
            429 | 529 => LlmError::Throttled(message),
            404 | 500..=599 => LlmError::Unavailable(message),
            _ => LlmError::ApiError { status, message },
        }
    }

    /// Only throttling is worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmError::Throttled(_))
    }
}

/// Mock gateway for testing the agentic loop without real API calls.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Returns pre-configured responses in FIFO order and records every request.
    pub struct MockGateway {
        responses: Mutex<VecDeque<Result<ModelResponse, LlmError>>>,
        fallback: Mutex<Option<ModelResponse>>,
        requests: Mutex<Vec<(Vec<Turn>, Vec<ToolDefinition>)>>,
    }

    impl MockGateway {
        pub fn new() -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(None),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Queue a response that will be returned on a later call.
        pub fn queue_response(&self, response: ModelResponse) {
            self.responses.lock().unwrap().push_back(Ok(response));
        }

        /// Queue a simple text response.
        pub fn queue_text(&self, text: &str) {
            self.queue_response(ModelResponse::text(text));
        }

        /// Queue a reply requesting one tool call.
        pub fn queue_tool_call(&self, id: &str, name: &str, input: serde_json::Value) {
            self.queue_response(ModelResponse {
                content: vec![ContentBlock::ToolUse {
                    id: id.to_string(),
                    name: name.to_string(),
                    input,
                }],
                stop_reason: StopReason::ToolUse,
            });
        }

        pub fn queue_error(&self, error: LlmError) {
            self.responses.lock().unwrap().push_back(Err(error));
        }

        /// Response used whenever the queue is empty.
        pub fn always(&self, response: ModelResponse) {
            *self.fallback.lock().unwrap() = Some(response);
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        /// Transcript sent on the n-th call.
        pub fn turns_sent(&self, n: usize) -> Vec<Turn> {
            self.requests.lock().unwrap()[n].0.clone()
        }

        pub fn tools_sent(&self, n: usize) -> Vec<ToolDefinition> {
            self.requests.lock().unwrap()[n].1.clone()
        }
    }

    impl Default for MockGateway {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ModelGateway for MockGateway {
        async fn complete(
            &self,
            turns: &[Turn],
            tools: &[ToolDefinition],
            _options: &CompletionOptions,
        ) -> Result<ModelResponse, LlmError> {
            self.requests
                .lock()
                .unwrap()
                .push((turns.to_vec(), tools.to_vec()));
            if let Some(next) = self.responses.lock().unwrap().pop_front() {
                return next;
            }
            Ok(self
                .fallback
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| ModelResponse::text("")))
        }

        fn backend_name(&self) -> &str {
            "mock"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_classification() {
        assert!(matches!(LlmError::from_status(401, "x"), LlmError::Auth(_)));
        assert!(matches!(LlmError::from_status(403, "x"), LlmError::Auth(_)));
        assert!(matches!(LlmError::from_status(429, "x"), LlmError::Throttled(_)));
        assert!(matches!(LlmError::from_status(529, "x"), LlmError::Throttled(_)));
        assert!(matches!(LlmError::from_status(404, "x"), LlmError::Unavailable(_)));
        assert!(matches!(LlmError::from_status(503, "x"), LlmError::Unavailable(_)));
        assert!(matches!(
            LlmError::from_status(400, "bad"),
            LlmError::ApiError { status: 400, .. }
        ));
    }

    #[test]
    fn test_only_throttling_is_transient() {
        assert!(LlmError::Throttled("slow down".into()).is_transient());
        assert!(!LlmError::Auth("no".into()).is_transient());
        assert!(!LlmError::Unavailable("gone".into()).is_transient());
        assert!(!LlmError::Timeout(Duration::from_secs(1)).is_transient());
    }

    #[test]
    fn test_response_tool_calls() {
        let response = ModelResponse {
            content: vec![
                ContentBlock::Text {
                    text: "Checking".to_string(),
                },
                ContentBlock::ToolUse {
                    id: "toolu_1".to_string(),
                    name: "search".to_string(),
                    input: json!({"q": "x"}),
                },
            ],
            stop_reason: StopReason::ToolUse,
        };
        assert!(!response.is_final());
        assert_eq!(response.tool_calls()[0].id, "toolu_1");
        assert!(ModelResponse::text("done").is_final());
    }
}
