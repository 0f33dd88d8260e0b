use std::sync::Arc;

use chatbot_core::Config;
use chatbot_tool_runtime::{AgenticLoop, SessionManager, ToolRegistry};

pub struct AppState {
    pub config: Config,
    pub registry: Arc<ToolRegistry>,
    pub sessions: SessionManager,
    pub agentic_loop: AgenticLoop,
}

impl AppState {
    /// Name of the model backend behind the agentic loop.
    pub fn backend(&self) -> &str {
        self.agentic_loop.backend_name()
    }
}
