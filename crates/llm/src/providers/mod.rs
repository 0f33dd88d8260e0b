pub mod anthropic;
pub mod bedrock;

use std::sync::Arc;

use tracing::info;

use chatbot_core::config::LlmConfig;
use chatbot_core::LlmBackend;
use chatbot_tool_runtime::{LlmError, ModelGateway};

use crate::retry::{RetryPolicy, RetryingGateway};

/// Create the configured model gateway, wrapped with throttling retries.
pub async fn create_gateway(llm_config: &LlmConfig) -> Result<Arc<dyn ModelGateway>, LlmError> {
    let inner: Arc<dyn ModelGateway> = match llm_config.backend {
        LlmBackend::Anthropic => Arc::new(anthropic::AnthropicGateway::from_config(
            &llm_config.anthropic,
        )?),
        LlmBackend::Bedrock => Arc::new(bedrock::BedrockGateway::new(llm_config).await),
    };

    info!(
        backend = %llm_config.backend,
        model = llm_config.model_label(),
        max_retries = llm_config.max_retries,
        "Model gateway ready"
    );

    Ok(Arc::new(RetryingGateway::new(inner, retry_policy(llm_config))))
}

/// `LLM_MAX_RETRIES` counts retries; the policy counts the first attempt too.
fn retry_policy(llm_config: &LlmConfig) -> RetryPolicy {
    RetryPolicy::new(llm_config.max_retries.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn llm_config(pairs: &[(&str, &str)]) -> LlmConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        chatbot_core::Config::from_map(&map).unwrap().llm
    }

    #[tokio::test]
    async fn test_anthropic_backend_selected() {
        let config = llm_config(&[("LLM_BACKEND", "anthropic"), ("ANTHROPIC_API_KEY", "sk-test")]);
        let gateway = create_gateway(&config).await.unwrap();
        assert_eq!(gateway.backend_name(), "anthropic");
    }

    #[tokio::test]
    async fn test_bedrock_is_default_backend() {
        let gateway = create_gateway(&llm_config(&[])).await.unwrap();
        assert_eq!(gateway.backend_name(), "bedrock");
    }

    #[test]
    fn test_retries_exclude_first_attempt() {
        assert_eq!(retry_policy(&llm_config(&[])).max_attempts, 4);
        assert_eq!(retry_policy(&llm_config(&[("LLM_MAX_RETRIES", "0")])).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let mut config = llm_config(&[]);
        config.backend = LlmBackend::Anthropic;
        let err = create_gateway(&config).await.err().unwrap();
        assert!(matches!(err, LlmError::NotConfigured(_)));
    }
}
