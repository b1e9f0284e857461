//! Wire shapes for the two tool-calling dialects.
//!
//! Field names and nesting match the provider APIs exactly; the serde
//! renames below are the boundary contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON schema used when a tool declares no parameters.
pub fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

// ── OpenAI dialect ───────────────────────────────────────────

/// `{ type: "function", function: { name, description?, parameters? } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiTool {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<OpenAiFunction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiFunction {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// `{ id, type: "function", function: { name, arguments } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: ToolCallFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    /// JSON-encoded argument object.
    #[serde(default = "empty_arguments")]
    pub arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

fn empty_arguments() -> String {
    "{}".to_string()
}

/// Message content: a plain string or an array of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<Value>),
}

/// A single OpenAI-style chat message.
///
/// Carries tool-calling metadata so `tool` role messages and assistant
/// `tool_calls` survive translation to other dialects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    /// Convenience constructor for a plain message (no tool metadata).
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(MessageContent::Text(content.into())),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    /// Assistant message carrying tool calls and no text.
    pub fn assistant_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".into(),
            content: None,
            tool_calls: Some(calls),
            tool_call_id: None,
            name: None,
        }
    }

    /// `tool` role message answering `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".into(),
            content: Some(MessageContent::Text(content.into())),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            name: None,
        }
    }

    /// Flattened text content. Array content keeps only `text` parts.
    pub fn text(&self) -> String {
        match &self.content {
            None => String::new(),
            Some(MessageContent::Text(t)) => t.clone(),
            Some(MessageContent::Parts(parts)) => parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

// ── Gemini dialect ───────────────────────────────────────────

/// `{ functionDeclarations: [...] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiTools {
    #[serde(rename = "functionDeclarations")]
    pub function_declarations: Vec<GeminiFunctionDeclaration>,
}

/// A declaration always serialises `parameters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiFunctionDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Value,
}

impl GeminiFunctionDeclaration {
    /// Replace a missing or null schema with the empty-object placeholder.
    pub fn with_placeholder_parameters(mut self) -> Self {
        if self.parameters.is_null() {
            self.parameters = empty_object_schema();
        }
        self
    }
}

/// `{ name, args }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiFunctionCall {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

/// `{ name, response }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiFunctionResponse {
    pub name: String,
    #[serde(default)]
    pub response: Value,
}

/// One response part that may carry a call, a call result, or neither.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeminiToolResult {
    #[serde(rename = "functionCall", default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<GeminiFunctionCall>,
    #[serde(rename = "functionResponse", default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<GeminiFunctionResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_serialises_with_type_field() {
        let call = ToolCall {
            id: "call_1".into(),
            kind: "function".into(),
            function: ToolCallFunction {
                name: "read".into(),
                arguments: "{}".into(),
            },
        };
        let v = serde_json::to_value(&call).unwrap();
        assert_eq!(v["type"], "function");
        assert_eq!(v["function"]["arguments"], "{}");
    }

    #[test]
    fn declaration_placeholder_fills_null_parameters() {
        let decl: GeminiFunctionDeclaration =
            serde_json::from_value(json!({ "name": "ping" })).unwrap();
        let decl = decl.with_placeholder_parameters();
        assert_eq!(decl.parameters, empty_object_schema());
    }

    #[test]
    fn message_text_flattens_parts() {
        let msg: ChatMessage = serde_json::from_value(json!({
            "role": "user",
            "content": [
                { "type": "text", "text": "hello " },
                { "type": "image_url", "image_url": { "url": "x" } },
                { "type": "text", "text": "world" }
            ]
        }))
        .unwrap();
        assert_eq!(msg.text(), "hello world");
    }

    #[test]
    fn null_content_is_accepted() {
        let msg: ChatMessage =
            serde_json::from_value(json!({ "role": "assistant", "content": null })).unwrap();
        assert!(msg.content.is_none());
        assert_eq!(msg.text(), "");
    }
}
