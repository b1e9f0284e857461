//! OpenAI chat-completions client. Also serves OpenAI-compatible
//! gateways (OpenRouter, local servers) through an endpoint override.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{ProviderClient, ProviderReply, ProviderRequest, ToolCall};
use crate::router::ProviderFormat;

/// Default endpoint for OpenAI chat completions.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Well-known chat-completions URL for a provider id.
pub fn default_endpoint(provider_id: &str) -> Option<&'static str> {
    match provider_id {
        "openai" => Some(DEFAULT_ENDPOINT),
        "openrouter" => Some(OPENROUTER_ENDPOINT),
        _ => None,
    }
}

pub struct OpenAiClient {
    api_key: String,
    endpoint: String,
    client: Client,
    /// Model name sent in the request body (e.g. "gpt-4o-mini").
    model: String,
}

impl OpenAiClient {
    pub fn with_client(client: Client, api_key: String, endpoint: String, model: String) -> Self {
        Self {
            api_key,
            endpoint,
            client,
            model,
        }
    }

    fn body(&self, req: &ProviderRequest<'_>) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": req.messages,
        });
        if !req.tools.is_empty() {
            body["tools"] = Value::Array(req.tools.to_vec());
            body["tool_choice"] = json!("auto");
        }
        body
    }
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    async fn complete(&self, req: &ProviderRequest<'_>) -> anyhow::Result<ProviderReply> {
        let mut call = self.client.post(&self.endpoint).json(&self.body(req));
        if !self.api_key.is_empty() {
            call = call.bearer_auth(&self.api_key);
        }

        let resp = super::check_status(call.send().await?, "OpenAI").await?;
        let json: Value = resp.json().await?;
        parse_reply(&json)
    }

    fn format(&self) -> ProviderFormat {
        ProviderFormat::OpenAi
    }
}

/// Pull the first choice out of a chat-completions response.
fn parse_reply(json: &Value) -> anyhow::Result<ProviderReply> {
    let choice = &json["choices"][0];
    let message = &choice["message"];
    if !message.is_object() {
        anyhow::bail!("OpenAI response has no choices");
    }

    let tool_calls: Vec<ToolCall> = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .filter_map(|tc| serde_json::from_value(tc.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    let mut reply = ProviderReply {
        content: message["content"].as_str().unwrap_or_default().to_string(),
        tool_calls,
        signature: None,
        finish_reason: String::new(),
    };
    reply.finish_reason = choice["finish_reason"]
        .as_str()
        .map(String::from)
        .unwrap_or_else(|| reply.default_finish_reason().to_string());
    Ok(reply)
}
