//! Translation between transcript turns and the Anthropic Messages JSON
//! shared by the direct API and Bedrock.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};

use chatbot_tool_runtime::{
    CompletionOptions, ContentBlock, LlmError, ModelResponse, Role, StopReason, ToolDefinition,
    Turn, TurnContent,
};

/// Version string Bedrock expects inside the request body.
pub const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Where the request body is going. The direct API names the model in the
/// body; Bedrock takes it from the URL and wants `anthropic_version` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyFlavor {
    Direct { model: String },
    Bedrock,
}

/// Translate a [`ToolDefinition`] into the Anthropic tool format.
pub(crate) fn tool_definition_to_anthropic(tool: &ToolDefinition) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.input_schema,
    })
}

fn api_role(role: Role) -> &'static str {
    match role {
        Role::Assistant => "assistant",
        // Tool results travel back to the model as user content.
        Role::User | Role::Tool => "user",
    }
}

fn turn_blocks(turn: &Turn) -> Vec<ContentBlock> {
    let blocks = match &turn.content {
        TurnContent::Text(text) => vec![ContentBlock::Text { text: text.clone() }],
        TurnContent::Blocks(blocks) => blocks.clone(),
    };
    // The API rejects empty text blocks.
    blocks
        .into_iter()
        .filter(|b| !matches!(b, ContentBlock::Text { text } if text.is_empty()))
        .collect()
}

/// Build the `messages` array. Consecutive turns mapping to the same API role
/// (e.g. several tool results) are merged into one message.
pub(crate) fn turns_to_messages(turns: &[Turn]) -> Vec<Value> {
    let mut merged: Vec<(&'static str, Vec<ContentBlock>)> = Vec::new();
    for turn in turns {
        let blocks = turn_blocks(turn);
        if blocks.is_empty() {
            continue;
        }
        let role = api_role(turn.role);
        match merged.last_mut() {
            Some((last_role, last_blocks)) if *last_role == role => last_blocks.extend(blocks),
            _ => merged.push((role, blocks)),
        }
    }

    merged
        .into_iter()
        .map(|(role, blocks)| {
            let content = match blocks.as_slice() {
                [ContentBlock::Text { text }] if role == "user" => json!(text),
                _ => json!(blocks),
            };
            json!({ "role": role, "content": content })
        })
        .collect()
}

/// Assemble a complete Messages request body.
pub fn build_request_body(
    turns: &[Turn],
    tools: &[ToolDefinition],
    options: &CompletionOptions,
    flavor: &BodyFlavor,
) -> Value {
    let mut body = json!({
        "max_tokens": options.max_tokens,
        "messages": turns_to_messages(turns),
    });

    match flavor {
        BodyFlavor::Direct { model } => body["model"] = json!(model),
        BodyFlavor::Bedrock => body["anthropic_version"] = json!(BEDROCK_ANTHROPIC_VERSION),
    }

    if !tools.is_empty() {
        let api_tools: Vec<Value> = tools.iter().map(tool_definition_to_anthropic).collect();
        body["tools"] = json!(api_tools);
    }

    if let Some(system) = &options.system_prompt {
        body["system"] = json!(system);
    }

    body
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<Value>,
    #[serde(default)]
    stop_reason: Option<String>,
}

/// Parse a Messages API response body into a [`ModelResponse`].
pub fn parse_response(body: Value) -> Result<ModelResponse, LlmError> {
    let response: MessagesResponse = serde_json::from_value(body)
        .map_err(|e| LlmError::InvalidResponse(format!("unexpected response shape: {}", e)))?;

    let mut content = Vec::with_capacity(response.content.len());
    for raw in response.content {
        match raw["type"].as_str() {
            Some("text") | Some("tool_use") => {
                let block: ContentBlock = serde_json::from_value(raw)
                    .map_err(|e| LlmError::InvalidResponse(format!("malformed content block: {}", e)))?;
                content.push(block);
            }
            other => trace!(block_type = ?other, "ignoring content block"),
        }
    }

    let stop_reason = match response.stop_reason.as_deref() {
        Some("tool_use") => StopReason::ToolUse,
        Some("max_tokens") => StopReason::MaxTokens,
        Some("stop_sequence") => StopReason::StopSequence,
        _ => StopReason::EndTurn,
    };

    debug!(blocks = content.len(), ?stop_reason, "parsed model response");
    Ok(ModelResponse {
        content,
        stop_reason,
    })
}

/// Pull `error.message` out of an API error body, falling back to the raw text.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v["error"]["message"]
                .as_str()
                .or_else(|| v["message"].as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}
