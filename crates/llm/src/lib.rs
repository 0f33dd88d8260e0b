//! Model gateways for the Anthropic Messages API, called directly or through
//! AWS Bedrock.

pub mod credentials;
pub mod providers;
pub mod retry;
pub mod translate;

pub use providers::anthropic::AnthropicGateway;
pub use providers::bedrock::BedrockGateway;
pub use providers::create_gateway;
pub use retry::{RetryPolicy, RetryingGateway};
