use crate::tool::{ToolCall, ToolResult};
use crate::transcript_log::ConversationLog;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// A structured content block, in Anthropic Messages shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl From<ToolCall> for ContentBlock {
    fn from(call: ToolCall) -> Self {
        ContentBlock::ToolUse {
            id: call.id,
            name: call.name,
            input: call.input,
        }
    }
}

impl From<ToolResult> for ContentBlock {
    fn from(result: ToolResult) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: result.tool_call_id,
            content: result.content,
            is_error: result.is_error,
        }
    }
}

/// Turn content: plain text or a list of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// One entry in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Position in the conversation, assigned on append
    #[serde(default)]
    pub seq: usize,
    pub role: Role,
    pub content: TurnContent,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            seq: 0,
            role: Role::User,
            content: TurnContent::Text(text.into()),
        }
    }

    /// Assistant turn from model output. Output without tool use (including
    /// an empty reply) collapses to plain text.
    pub fn assistant(blocks: Vec<ContentBlock>) -> Self {
        let text_only = blocks
            .iter()
            .all(|b| matches!(b, ContentBlock::Text { .. }));
        let content = if text_only {
            TurnContent::Text(
                blocks
                    .into_iter()
                    .filter_map(|b| match b {
                        ContentBlock::Text { text } => Some(text),
                        _ => None,
                    })
                    .collect(),
            )
        } else {
            TurnContent::Blocks(blocks)
        };
        Self {
            seq: 0,
            role: Role::Assistant,
            content,
        }
    }

    pub fn tool(result: ToolResult) -> Self {
        Self {
            seq: 0,
            role: Role::Tool,
            content: TurnContent::Blocks(vec![result.into()]),
        }
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        match &self.content {
            TurnContent::Blocks(blocks) => blocks,
            TurnContent::Text(_) => &[],
        }
    }

    /// Tool-use requests carried by this turn.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.blocks()
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

    /// Concatenated text of the turn, ignoring tool blocks.
    pub fn text(&self) -> String {
        match &self.content {
            TurnContent::Text(text) => text.clone(),
            TurnContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

/// Ordered, append-only transcript of one conversation.
pub struct Conversation {
    id: Uuid,
    turns: Vec<Turn>,
    log: Option<Arc<ConversationLog>>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            turns: Vec::new(),
            log: None,
        }
    }

    pub fn with_log(mut self, log: Arc<ConversationLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Append a turn, assigning its sequence number.
    pub fn push(&mut self, mut turn: Turn) -> &Turn {
        turn.seq = self.turns.len();
        if let Some(log) = &self.log {
            if let Err(e) = log.append(self.id, &turn) {
                warn!(conversation_id = %self.id, seq = turn.seq, error = %e, "Failed to write conversation log");
            }
        }
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    /// Start over with an empty transcript under a fresh id.
    pub fn reset(&mut self) {
        if let Some(log) = &self.log {
            log.close(self.id);
        }
        self.turns.clear();
        self.id = Uuid::new_v4();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Drop for Conversation {
    fn drop(&mut self) {
        if let Some(log) = &self.log {
            log.close(self.id);
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_push_assigns_seq() {
        let mut conv = Conversation::new();
        conv.push(Turn::user("Hello"));
        conv.push(Turn::assistant(vec![ContentBlock::Text {
            text: "Hi there!".to_string(),
        }]));

        assert_eq!(conv.len(), 2);
        assert_eq!(conv.turns()[0].seq, 0);
        assert_eq!(conv.turns()[1].seq, 1);
        assert_eq!(conv.turns()[1].content, TurnContent::Text("Hi there!".to_string()));
    }

    #[test]
    fn test_assistant_with_tool_use_keeps_blocks() {
        let turn = Turn::assistant(vec![
            ContentBlock::Text {
                text: "Let me check.".to_string(),
            },
            ContentBlock::ToolUse {
                id: "toolu_1".to_string(),
                name: "search".to_string(),
                input: json!({"q": "rust"}),
            },
        ]);

        let calls = turn.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "search");
        assert_eq!(turn.text(), "Let me check.");
    }

    #[test]
    fn test_assistant_without_tool_use_is_text() {
        let empty = Turn::assistant(Vec::new());
        assert_eq!(empty.content, TurnContent::Text(String::new()));
        assert_eq!(serde_json::to_value(&empty).unwrap()["content"], "");

        let split = Turn::assistant(vec![
            ContentBlock::Text {
                text: "Hello, ".to_string(),
            },
            ContentBlock::Text {
                text: "world".to_string(),
            },
        ]);
        assert_eq!(split.content, TurnContent::Text("Hello, world".to_string()));
    }

    #[test]
    fn test_tool_turn_shape() {
        let turn = Turn::tool(ToolResult::error("toolu_1", "Unknown tool: x"));
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["content"][0]["type"], "tool_result");
        assert_eq!(json["content"][0]["tool_use_id"], "toolu_1");
        assert_eq!(json["content"][0]["is_error"], true);
    }

    #[test]
    fn test_reset_changes_id() {
        let mut conv = Conversation::new();
        let first = conv.id();
        conv.push(Turn::user("x"));
        conv.reset();
        assert!(conv.is_empty());
        assert_ne!(conv.id(), first);
    }

    #[test]
    fn test_turn_deserializes_plain_and_blocks() {
        let plain: Turn = serde_json::from_value(json!({"role": "user", "content": "hi"})).unwrap();
        assert_eq!(plain.content, TurnContent::Text("hi".to_string()));

        let blocks: Turn = serde_json::from_value(json!({
            "seq": 3,
            "role": "assistant",
            "content": [{"type": "text", "text": "ok"}]
        }))
        .unwrap();
        assert_eq!(blocks.seq, 3);
        assert_eq!(blocks.text(), "ok");
    }
}
