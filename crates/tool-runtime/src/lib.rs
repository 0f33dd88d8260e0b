pub mod tool;
pub mod provider;
pub mod registry;
pub mod gateway;
pub mod conversation;
pub mod transcript_log;
pub mod runtime;
pub mod session;

pub use tool::{EchoTool, Tool, ToolCall, ToolDefinition, ToolError, ToolResult};
pub use provider::{LocalToolProvider, ProviderStatus, ToolProvider};
pub use registry::{ProviderSummary, RouterError, ToolCollision, ToolRegistry};
pub use gateway::{CompletionOptions, LlmError, ModelGateway, ModelResponse, StopReason};
pub use conversation::{ContentBlock, Conversation, Role, Turn, TurnContent};
pub use transcript_log::{ConversationLog, LogRecord};
pub use runtime::{AgenticLoop, AgenticLoopError};
pub use session::SessionManager;
