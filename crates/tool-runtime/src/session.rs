use crate::conversation::{Conversation, Turn};
use crate::runtime::{AgenticLoop, AgenticLoopError};
use crate::transcript_log::ConversationLog;
use chatbot_core::HistoryMode;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

/// Conversations keyed by session id.
///
/// Each session sits behind its own async mutex: queries on one session run
/// one at a time, different sessions proceed concurrently.
pub struct SessionManager {
    mode: HistoryMode,
    sessions: Mutex<HashMap<String, Arc<AsyncMutex<Conversation>>>>,
    log: Option<Arc<ConversationLog>>,
}

impl SessionManager {
    pub fn new(mode: HistoryMode) -> Self {
        Self {
            mode,
            sessions: Mutex::new(HashMap::new()),
            log: None,
        }
    }

    pub fn with_log(mut self, log: Arc<ConversationLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn mode(&self) -> HistoryMode {
        self.mode
    }

    /// Handle to the session's conversation, created on first use.
    pub fn session(&self, session_id: &str) -> Arc<AsyncMutex<Conversation>> {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let entry = sessions.entry(session_id.to_string()).or_insert_with(|| {
            debug!(session_id, "Creating session");
            let conversation = match &self.log {
                Some(log) => Conversation::new().with_log(Arc::clone(log)),
                None => Conversation::new(),
            };
            Arc::new(AsyncMutex::new(conversation))
        });
        Arc::clone(entry)
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .map(|s| s.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run one query on a session and return the transcript to show the caller.
    ///
    /// `PerQuery` clears the session first, so the transcript is just this
    /// query's turns. `Persistent` returns the whole accumulated history.
    pub async fn submit(
        &self,
        agentic_loop: &AgenticLoop,
        session_id: &str,
        query: String,
    ) -> Result<Vec<Turn>, AgenticLoopError> {
        let session = self.session(session_id);
        let mut conversation = session.lock().await;
        if self.mode == HistoryMode::PerQuery {
            conversation.reset();
        }
        agentic_loop.run(&mut conversation, query).await?;
        Ok(conversation.turns().to_vec())
    }
}
