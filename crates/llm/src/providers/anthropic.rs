//! Direct Anthropic Messages API backend.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use chatbot_core::config::AnthropicConfig;
use chatbot_tool_runtime::{CompletionOptions, LlmError, ModelGateway, ModelResponse, ToolDefinition, Turn};

use crate::translate::{build_request_body, error_message, parse_response, BodyFlavor};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicGateway {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicGateway {
    /// Create a new gateway.
    ///
    /// # Arguments
    /// * `api_key` - Anthropic API key
    /// * `model` - Model name (e.g. `"claude-sonnet-4-5-20250929"`)
    /// * `base_url` - API base URL (e.g. `"https://api.anthropic.com"`)
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &AnthropicConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .as_ref()
            .ok_or_else(|| LlmError::NotConfigured("ANTHROPIC_API_KEY not set".into()))?;
        Ok(Self::new(
            api_key.clone(),
            config.model.clone(),
            config.base_url.clone(),
        ))
    }
}

#[async_trait]
impl ModelGateway for AnthropicGateway {
    async fn complete(
        &self,
        turns: &[Turn],
        tools: &[ToolDefinition],
        options: &CompletionOptions,
    ) -> Result<ModelResponse, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = build_request_body(
            turns,
            tools,
            options,
            &BodyFlavor::Direct {
                model: self.model.clone(),
            },
        );

        debug!(model = %self.model, url = %url, tools = tools.len(), "Anthropic request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status, error_message(&body_text)));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        parse_response(json)
    }

    fn backend_name(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(server: &MockServer) -> AnthropicGateway {
        AnthropicGateway::new(
            "test-key".to_string(),
            "claude-sonnet-4-5-20250929".to_string(),
            format!("{}/", server.uri()),
        )
    }

    #[tokio::test]
    async fn test_text_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(json!({
                "model": "claude-sonnet-4-5-20250929",
                "max_tokens": 8192,
                "messages": [{"role": "user", "content": "Hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "Hi!"}],
                "stop_reason": "end_turn"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = gateway(&server)
            .complete(&[Turn::user("Hello")], &[], &CompletionOptions::default())
            .await
            .unwrap();
        assert!(response.is_final());
        assert_eq!(
            response.content,
            vec![chatbot_tool_runtime::ContentBlock::Text {
                text: "Hi!".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_tools_sent_and_tool_use_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_partial_json(json!({"tools": [{"name": "echo"}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "tool_use", "id": "toolu_1", "name": "echo", "input": {"message": "x"}}],
                "stop_reason": "tool_use"
            })))
            .mount(&server)
            .await;

        let tools = vec![ToolDefinition {
            name: "echo".to_string(),
            description: "Echo".to_string(),
            input_schema: json!({"type": "object"}),
        }];
        let response = gateway(&server)
            .complete(&[Turn::user("echo x")], &tools, &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(response.tool_calls()[0].id, "toolu_1");
    }

    #[tokio::test]
    async fn test_error_statuses_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "type": "error",
                "error": {"type": "rate_limit_error", "message": "Rate limited"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "type": "error",
                "error": {"type": "authentication_error", "message": "invalid x-api-key"}
            })))
            .mount(&server)
            .await;

        let gw = gateway(&server);
        let throttled = gw
            .complete(&[Turn::user("a")], &[], &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(throttled, LlmError::Throttled(ref m) if m == "Rate limited"));

        let auth = gw
            .complete(&[Turn::user("a")], &[], &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(auth, LlmError::Auth(ref m) if m.contains("x-api-key")));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let gw = AnthropicGateway::new(
            "k".to_string(),
            "m".to_string(),
            "http://127.0.0.1:1".to_string(),
        );
        let err = gw
            .complete(&[Turn::user("a")], &[], &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::NetworkError(_)));
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = AnthropicConfig {
            api_key: None,
            model: "m".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
        };
        assert!(matches!(
            AnthropicGateway::from_config(&config),
            Err(LlmError::NotConfigured(_))
        ));
    }
}
