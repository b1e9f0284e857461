//! Gemini `generateContent` client.
//!
//! Requests are built from OpenAI-shaped history by [`crate::normalize`];
//! replies come back as OpenAI tool calls plus the turn's thought
//! signature.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{ProviderClient, ProviderReply, ProviderRequest};
use crate::normalize::{
    from_gemini_parts, last_signature, to_gemini_contents, to_gemini_tools, visible_text,
    NormalizeOptions,
};
use crate::router::ProviderFormat;

/// API base; the request URL is `<base>/models/<model>:generateContent`.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    api_key: String,
    endpoint: String,
    client: Client,
    model: String,
    opts: NormalizeOptions,
}

impl GeminiClient {
    pub fn with_client(client: Client, api_key: String, endpoint: String, model: String) -> Self {
        Self {
            api_key,
            endpoint,
            client,
            model,
            opts: NormalizeOptions::from_env(),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }

    fn body(&self, req: &ProviderRequest<'_>) -> Value {
        let converted = to_gemini_contents(req.messages, req.signature);
        for id in &converted.orphaned_results {
            tracing::warn!(tool_call_id = %id, "tool result without a matching call, dropped");
        }

        let mut body = json!({ "contents": converted.contents });
        if let Some(system) = converted.system_instruction {
            body["system_instruction"] = system;
        }

        let tools = to_gemini_tools(req.tools, self.opts);
        if let Some(block) = tools.value {
            body["tools"] = json!([block]);
        }
        body
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    async fn complete(&self, req: &ProviderRequest<'_>) -> anyhow::Result<ProviderReply> {
        let resp = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&self.body(req))
            .send()
            .await?;

        let resp = super::check_status(resp, "Gemini").await?;
        let json: Value = resp.json().await?;
        parse_reply(&json)
    }

    fn format(&self) -> ProviderFormat {
        ProviderFormat::Gemini
    }
}

fn parse_reply(json: &Value) -> anyhow::Result<ProviderReply> {
    let candidate = json["candidates"]
        .get(0)
        .ok_or_else(|| anyhow::anyhow!("Gemini response has no candidates"))?;
    let parts: Vec<Value> = candidate["content"]["parts"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    let mut reply = ProviderReply {
        content: visible_text(&parts),
        tool_calls: from_gemini_parts(&parts),
        signature: last_signature(&parts),
        finish_reason: String::new(),
    };
    reply.finish_reason = match candidate["finishReason"].as_str() {
        Some("MAX_TOKENS") => "length".to_string(),
        Some("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT") => {
            "content_filter".to_string()
        }
        _ => reply.default_finish_reason().to_string(),
    };
    Ok(reply)
}
