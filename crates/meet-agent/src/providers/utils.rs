use serde_json::{json, Value};
use std::collections::HashSet;

use super::base::{StopReason, Usage};
use crate::errors::{AgentError, AgentResult};
use crate::integration::schema::is_valid_tool_name;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

/// Convert internal Message format to Anthropic's content block format.
///
/// Tool requests that could not be parsed never reach the API as `tool_use` blocks, so
/// their answers are sent back as plain text instead of `tool_result` blocks.
pub fn messages_to_anthropic_spec(messages: &[Message]) -> Vec<Value> {
    let mut unparsed_requests = HashSet::new();
    let mut messages_spec = Vec::new();

    for message in messages {
        let mut blocks = Vec::new();

        for content in &message.content {
            match content {
                MessageContent::Text(text) => {
                    if !text.text.is_empty() {
                        blocks.push(json!({"type": "text", "text": text.text}));
                    }
                }
                MessageContent::ToolRequest(request) => match &request.tool_call {
                    Ok(tool_call) => blocks.push(json!({
                        "type": "tool_use",
                        "id": request.id,
                        "name": tool_call.name,
                        "input": tool_call.arguments,
                    })),
                    Err(e) => {
                        unparsed_requests.insert(request.id.clone());
                        blocks.push(json!({
                            "type": "text",
                            "text": format!(
                                "Tool request {} could not be parsed: {}",
                                request.id, e
                            ),
                        }));
                    }
                },
                MessageContent::ToolResponse(response) => {
                    if unparsed_requests.contains(&response.id) {
                        blocks.push(json!({"type": "text", "text": response.output}));
                    } else {
                        blocks.push(json!({
                            "type": "tool_result",
                            "tool_use_id": response.id,
                            "content": response.output,
                        }));
                    }
                }
            }
        }

        // The API rejects messages without content
        if blocks.is_empty() {
            continue;
        }

        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        messages_spec.push(json!({"role": role, "content": blocks}));
    }

    messages_spec
}

/// Convert internal Tool format to Anthropic's tool definitions
pub fn tools_to_anthropic_spec(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "input_schema": tool.input_schema,
            })
        })
        .collect()
}

/// Convert an Anthropic Messages API response to an assistant message
pub fn anthropic_response_to_message(response: &Value) -> AgentResult<Message> {
    let blocks = response
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| AgentError::Provider {
            message: "Invalid response format from Anthropic API: missing content".to_string(),
            status: None,
        })?;

    let mut message = Message::assistant();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                let text = block.get("text").and_then(Value::as_str).unwrap_or_default();
                message = message.with_text(text);
            }
            Some("tool_use") => {
                let id = block
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let name = block.get("name").and_then(Value::as_str).unwrap_or_default();
                let input = block.get("input").cloned().unwrap_or_else(|| json!({}));

                let tool_call = if !is_valid_tool_name(name) {
                    Err(AgentError::InvalidParameters(format!(
                        "The provided tool name '{}' had invalid characters, it must match this regex [a-zA-Z0-9_-]+",
                        name
                    )))
                } else if !input.is_object() {
                    Err(AgentError::InvalidParameters(format!(
                        "Could not interpret tool use parameters for id {}: expected an object",
                        id
                    )))
                } else {
                    Ok(ToolCall::new(name, input))
                };
                message = message.with_tool_request(id, tool_call);
            }
            other => {
                tracing::debug!("Ignoring unsupported content block type: {:?}", other);
            }
        }
    }

    Ok(message)
}

pub fn get_stop_reason(response: &Value) -> StopReason {
    response
        .get("stop_reason")
        .and_then(Value::as_str)
        .map(StopReason::from)
        .unwrap_or_else(|| StopReason::Other("missing".to_string()))
}

pub fn get_usage(response: &Value) -> Usage {
    let usage = &response["usage"];
    let input_tokens = usage["input_tokens"].as_i64().map(|v| v as i32);
    let output_tokens = usage["output_tokens"].as_i64().map(|v| v as i32);
    let total_tokens = match (input_tokens, output_tokens) {
        (Some(input), Some(output)) => Some(input + output),
        _ => None,
    };
    Usage::new(input_tokens, output_tokens, total_tokens)
}
