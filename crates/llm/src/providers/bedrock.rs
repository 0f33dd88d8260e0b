//! AWS Bedrock backend: the same Messages body, sent through InvokeModel.

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_bedrockruntime::config::http::HttpResponse;
use aws_sdk_bedrockruntime::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_bedrockruntime::operation::invoke_model::InvokeModelError;
use aws_sdk_bedrockruntime::primitives::Blob;
use serde_json::Value;
use tracing::{debug, info};

use chatbot_core::config::LlmConfig;
use chatbot_tool_runtime::{CompletionOptions, LlmError, ModelGateway, ModelResponse, ToolDefinition, Turn};

use crate::credentials::{credential_sources, credentials_chain};
use crate::translate::{build_request_body, parse_response, BodyFlavor};

pub struct BedrockGateway {
    client: aws_sdk_bedrockruntime::Client,
    model_id: String,
}

impl BedrockGateway {
    /// Build the SDK client for the configured region and credential chain.
    ///
    /// SDK-level retries are off; throttling is retried by the
    /// [`RetryingGateway`](crate::retry::RetryingGateway) wrapper instead.
    pub async fn new(config: &LlmConfig) -> Self {
        let region = config.bedrock.region.clone();
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .credentials_provider(credentials_chain(&config.aws))
            .retry_config(RetryConfig::disabled())
            .load()
            .await;

        info!(
            region = %region,
            model_id = %config.bedrock.model_id,
            credential_sources = ?credential_sources(&config.aws),
            "Bedrock client configured"
        );

        Self {
            client: aws_sdk_bedrockruntime::Client::new(&sdk_config),
            model_id: config.bedrock.model_id.clone(),
        }
    }
}

#[async_trait]
impl ModelGateway for BedrockGateway {
    async fn complete(
        &self,
        turns: &[Turn],
        tools: &[ToolDefinition],
        options: &CompletionOptions,
    ) -> Result<ModelResponse, LlmError> {
        let body = build_request_body(turns, tools, options, &BodyFlavor::Bedrock);
        let bytes = serde_json::to_vec(&body)
            .map_err(|e| LlmError::InvalidResponse(format!("request encoding failed: {}", e)))?;

        debug!(model_id = %self.model_id, tools = tools.len(), "Bedrock InvokeModel");

        let output = self
            .client
            .invoke_model()
            .model_id(&self.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(bytes))
            .send()
            .await
            .map_err(map_sdk_error)?;

        let json: Value = serde_json::from_slice(output.body().as_ref())
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        parse_response(json)
    }

    fn backend_name(&self) -> &str {
        "bedrock"
    }
}

/// Classify a Bedrock service exception. `None` when the exception kind
/// carries no specific meaning and the HTTP status should decide.
fn classify_service_error(err: &InvokeModelError) -> Option<LlmError> {
    let message = err.message().unwrap_or("no message").to_string();
    if err.is_throttling_exception() || err.is_service_quota_exceeded_exception() {
        Some(LlmError::Throttled(message))
    } else if err.is_access_denied_exception() {
        Some(LlmError::Auth(message))
    } else if err.is_resource_not_found_exception()
        || err.is_model_not_ready_exception()
        || err.is_service_unavailable_exception()
        || err.is_model_timeout_exception()
        || err.is_internal_server_exception()
    {
        Some(LlmError::Unavailable(message))
    } else if err.is_validation_exception() {
        Some(LlmError::ApiError {
            status: 400,
            message,
        })
    } else {
        None
    }
}

fn map_sdk_error(err: SdkError<InvokeModelError, HttpResponse>) -> LlmError {
    match err {
        SdkError::ServiceError(ctx) => {
            if let Some(mapped) = classify_service_error(ctx.err()) {
                return mapped;
            }
            let message = ctx.err().message().unwrap_or("no message").to_string();
            LlmError::from_status(ctx.raw().status().as_u16(), message)
        }
        other => {
            let message = DisplayErrorContext(&other).to_string();
            if message.to_lowercase().contains("credentials") {
                LlmError::Auth(message)
            } else {
                LlmError::NetworkError(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_bedrockruntime::types::error::{
        AccessDeniedException, ModelNotReadyException, ThrottlingException, ValidationException,
    };

    #[test]
    fn test_throttling_is_transient() {
        let err = InvokeModelError::ThrottlingException(
            ThrottlingException::builder().message("Too many requests").build(),
        );
        let mapped = classify_service_error(&err).unwrap();
        assert!(matches!(mapped, LlmError::Throttled(ref m) if m == "Too many requests"));
        assert!(mapped.is_transient());
    }

    #[test]
    fn test_access_denied_is_auth() {
        let err = InvokeModelError::AccessDeniedException(
            AccessDeniedException::builder()
                .message("not authorized to invoke model")
                .build(),
        );
        assert!(matches!(classify_service_error(&err), Some(LlmError::Auth(_))));
    }

    #[test]
    fn test_model_not_ready_is_unavailable() {
        let err = InvokeModelError::ModelNotReadyException(
            ModelNotReadyException::builder().message("warming up").build(),
        );
        let mapped = classify_service_error(&err).unwrap();
        assert!(matches!(mapped, LlmError::Unavailable(_)));
        assert!(!mapped.is_transient());
    }

    #[test]
    fn test_validation_is_bad_request() {
        let err = InvokeModelError::ValidationException(
            ValidationException::builder().message("max_tokens too large").build(),
        );
        assert!(matches!(
            classify_service_error(&err),
            Some(LlmError::ApiError { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn test_backend_name() {
        let mut config = chatbot_core::Config::from_map(&Default::default())
            .unwrap()
            .llm;
        config.bedrock.region = "us-west-2".to_string();
        let gateway = BedrockGateway::new(&config).await;
        assert_eq!(gateway.backend_name(), "bedrock");
        assert_eq!(gateway.model_id, config.bedrock.model_id);
    }
}
