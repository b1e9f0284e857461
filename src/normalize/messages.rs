//! Chat-history translation: OpenAI messages → Gemini `contents`, plus
//! the tool-result conversions in both directions.

use std::collections::HashMap;

use serde_json::{json, Value};
use tracing::debug;

use super::types::{ChatMessage, GeminiFunctionResponse};
use super::tool_call_to_gemini_call;

/// Gemini request fragments built from an OpenAI history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeminiContents {
    pub contents: Vec<Value>,
    /// Joined `system` messages, as `{ parts: [{ text }] }`.
    pub system_instruction: Option<Value>,
    /// `tool_call_id`s of tool results whose originating call was not found.
    pub orphaned_results: Vec<String>,
}

/// Wrap a tool's textual output as a Gemini function response. JSON
/// object output is passed through; anything else becomes `{ result }`.
pub fn tool_result_to_function_response(name: &str, content: &str) -> GeminiFunctionResponse {
    let response = match serde_json::from_str::<Value>(content) {
        Ok(v @ Value::Object(_)) => v,
        _ => json!({ "result": content }),
    };
    GeminiFunctionResponse {
        name: name.to_string(),
        response,
    }
}

/// Turn a Gemini function response back into an OpenAI `tool` message.
pub fn function_response_to_tool_message(
    response: &GeminiFunctionResponse,
    tool_call_id: &str,
) -> ChatMessage {
    let content = serde_json::to_string(&response.response).unwrap_or_else(|_| "{}".to_string());
    ChatMessage::tool_result(tool_call_id, content)
}

/// Translate an OpenAI history into Gemini contents.
///
/// When `signature` is given it is attached as `thoughtSignature` to the
/// first `functionCall` part of the latest model turn that made calls.
pub fn to_gemini_contents(messages: &[ChatMessage], signature: Option<&str>) -> GeminiContents {
    let mut out = GeminiContents::default();
    let mut system_texts: Vec<String> = Vec::new();
    let mut call_names: HashMap<String, String> = HashMap::new();
    let mut last_call_turn: Option<usize> = None;
    let mut in_tool_group = false;

    for msg in messages {
        match msg.role.as_str() {
            "system" | "developer" => {
                let text = msg.text();
                if !text.trim().is_empty() {
                    system_texts.push(text);
                }
                in_tool_group = false;
            }
            "assistant" | "model" => {
                let mut parts: Vec<Value> = Vec::new();
                let text = msg.text();
                if !text.is_empty() {
                    parts.push(json!({ "text": text }));
                }
                let mut has_calls = false;
                for call in msg.tool_calls.iter().flatten() {
                    call_names.insert(call.id.clone(), call.function.name.clone());
                    parts.push(json!({ "functionCall": tool_call_to_gemini_call(call) }));
                    has_calls = true;
                }
                if parts.is_empty() {
                    continue;
                }
                if has_calls {
                    last_call_turn = Some(out.contents.len());
                }
                out.contents.push(json!({ "role": "model", "parts": parts }));
                in_tool_group = false;
            }
            "tool" | "function" => {
                let call_id = msg.tool_call_id.clone().unwrap_or_default();
                let name = call_names
                    .get(&call_id)
                    .cloned()
                    .or_else(|| msg.name.clone());
                let Some(name) = name else {
                    debug!(tool_call_id = %call_id, "tool result without a matching call, skipping");
                    out.orphaned_results.push(call_id);
                    continue;
                };
                let part = json!({
                    "functionResponse": tool_result_to_function_response(&name, &msg.text())
                });
                if in_tool_group {
                    if let Some(parts) = out
                        .contents
                        .last_mut()
                        .and_then(|c| c.get_mut("parts"))
                        .and_then(Value::as_array_mut)
                    {
                        parts.push(part);
                        continue;
                    }
                }
                out.contents.push(json!({ "role": "user", "parts": [part] }));
                in_tool_group = true;
            }
            _ => {
                let text = msg.text();
                if text.is_empty() {
                    continue;
                }
                out.contents.push(json!({ "role": "user", "parts": [{ "text": text }] }));
                in_tool_group = false;
            }
        }
    }

    if !system_texts.is_empty() {
        out.system_instruction = Some(json!({ "parts": [{ "text": system_texts.join("\n\n") }] }));
    }

    if let (Some(sig), Some(turn)) = (signature.filter(|s| !s.is_empty()), last_call_turn) {
        attach_signature(&mut out.contents[turn], sig);
    }

    out
}

fn attach_signature(content: &mut Value, signature: &str) {
    let Some(parts) = content.get_mut("parts").and_then(Value::as_array_mut) else {
        return;
    };
    if let Some(part) = parts
        .iter_mut()
        .find(|p| p.get("functionCall").is_some())
        .and_then(Value::as_object_mut)
    {
        part.insert("thoughtSignature".into(), Value::String(signature.to_string()));
    }
}

/// Collect the last `thoughtSignature` found on a list of response parts.
pub fn last_signature(parts: &[Value]) -> Option<String> {
    parts
        .iter()
        .rev()
        .filter_map(|p| p.get("thoughtSignature").and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(String::from)
}

/// Text parts joined in order, with `thought` parts left out.
pub fn visible_text(parts: &[Value]) -> String {
    parts
        .iter()
        .filter(|p| !p.get("thought").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::types::{ToolCall, ToolCallFunction};

    fn call(id: &str, name: &str, args: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            kind: "function".into(),
            function: ToolCallFunction {
                name: name.into(),
                arguments: args.into(),
            },
        }
    }

    #[test]
    fn system_messages_become_instruction() {
        let msgs = vec![
            ChatMessage::new("system", "be terse"),
            ChatMessage::new("system", "no emoji"),
            ChatMessage::new("user", "hi"),
        ];
        let out = to_gemini_contents(&msgs, None);
        assert_eq!(out.contents.len(), 1);
        assert_eq!(
            out.system_instruction.unwrap()["parts"][0]["text"],
            "be terse\n\nno emoji"
        );
    }

    #[test]
    fn tool_results_are_grouped_and_named() {
        let msgs = vec![
            ChatMessage::new("user", "list and read"),
            ChatMessage::assistant_calls(vec![
                call("c1", "ls", r#"{"path":"."}"#),
                call("c2", "read", r#"{"file":"a.rs"}"#),
            ]),
            ChatMessage::tool_result("c1", "a.rs"),
            ChatMessage::tool_result("c2", r#"{"bytes":12}"#),
        ];
        let out = to_gemini_contents(&msgs, None);
        assert_eq!(out.contents.len(), 3);

        let model = &out.contents[1];
        assert_eq!(model["role"], "model");
        assert_eq!(model["parts"][0]["functionCall"]["name"], "ls");
        assert_eq!(model["parts"][0]["functionCall"]["args"]["path"], ".");

        let results = out.contents[2]["parts"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["functionResponse"]["name"], "ls");
        assert_eq!(results[0]["functionResponse"]["response"]["result"], "a.rs");
        assert_eq!(results[1]["functionResponse"]["response"]["bytes"], 12);
    }

    #[test]
    fn orphaned_tool_result_is_reported() {
        let msgs = vec![ChatMessage::tool_result("missing", "x")];
        let out = to_gemini_contents(&msgs, None);
        assert!(out.contents.is_empty());
        assert_eq!(out.orphaned_results, vec!["missing".to_string()]);
    }

    #[test]
    fn signature_attaches_to_latest_call_turn() {
        let msgs = vec![
            ChatMessage::assistant_calls(vec![call("c1", "ls", "{}")]),
            ChatMessage::tool_result("c1", "ok"),
            ChatMessage::assistant_calls(vec![call("c2", "read", "{}"), call("c3", "cat", "{}")]),
        ];
        let out = to_gemini_contents(&msgs, Some("sig-A"));
        assert!(out.contents[0]["parts"][0].get("thoughtSignature").is_none());
        let parts = out.contents[2]["parts"].as_array().unwrap();
        assert_eq!(parts[0]["thoughtSignature"], "sig-A");
        assert!(parts[1].get("thoughtSignature").is_none());
    }

    #[test]
    fn function_response_round_trips_to_tool_message() {
        let resp = tool_result_to_function_response("read", "plain text");
        let msg = function_response_to_tool_message(&resp, "c9");
        assert_eq!(msg.role, "tool");
        assert_eq!(msg.tool_call_id.as_deref(), Some("c9"));
        let decoded: Value = serde_json::from_str(&msg.text()).unwrap();
        assert_eq!(decoded["result"], "plain text");
    }

    #[test]
    fn last_signature_and_visible_text() {
        let parts = vec![
            json!({ "text": "thinking...", "thought": true }),
            json!({ "text": "Hello", "thoughtSignature": "s1" }),
            json!({ "functionCall": { "name": "ls" }, "thoughtSignature": "s2" }),
        ];
        assert_eq!(last_signature(&parts).as_deref(), Some("s2"));
        assert_eq!(visible_text(&parts), "Hello");
    }
}
