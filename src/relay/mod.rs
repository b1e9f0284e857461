//! Chat relay: pick a model, talk to its provider, and answer in the
//! OpenAI chat-completions shape.
//!
//! Each candidate (requested model, then the fallback chain) is retried
//! with exponential backoff (100 ms × 2^attempt) before falling through.
//! Thought signatures returned by Gemini are kept per session key and
//! replayed on the next request for that key.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::continuity::ContinuityStore;
use crate::models::{build_client, is_permanent_error, ChatMessage, ProviderRequest, ToolCall};
use crate::router::{ModelRecord, ModelRouter, ProviderFormat};

/// Incoming chat request. Extra OpenAI fields (temperature, ...) are
/// accepted and ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub tools: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Choice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssistantMessage {
    pub role: &'static str,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

pub struct Relay {
    router: Arc<dyn ModelRouter>,
    continuity: Arc<ContinuityStore>,
    max_retries: usize,
}

impl Relay {
    pub fn new(
        router: Arc<dyn ModelRouter>,
        continuity: Arc<ContinuityStore>,
        max_retries: usize,
    ) -> Self {
        Self {
            router,
            continuity,
            max_retries,
        }
    }

    pub fn router(&self) -> &Arc<dyn ModelRouter> {
        &self.router
    }

    /// Run one chat turn with retries and model fallback.
    pub async fn chat(&self, req: &ChatRequest) -> anyhow::Result<ChatCompletion> {
        if req.messages.is_empty() {
            anyhow::bail!("messages must not be empty");
        }
        let candidates = self.router.candidates(req.model.as_deref())?;
        let attempts = self.max_retries.max(1);
        let session_key = req.session_key.as_deref().filter(|k| !k.is_empty());
        let tools = req.tools.as_deref().unwrap_or_default();
        let mut last_err = anyhow::anyhow!("no models configured");

        for (idx, record) in candidates.iter().enumerate() {
            let client = match build_client(record) {
                Ok(c) => c,
                Err(e) => {
                    warn!(model = %record.id, error = %e, "cannot build provider client, skipping");
                    last_err = e;
                    continue;
                }
            };

            let signature = match (record.format, session_key) {
                (ProviderFormat::Gemini, Some(key)) => self.continuity.get_signature(key),
                _ => None,
            };
            let request = ProviderRequest {
                messages: &req.messages,
                tools,
                signature: signature.as_deref(),
            };

            for attempt in 0..attempts {
                match client.complete(&request).await {
                    Ok(reply) => {
                        if let (Some(key), Some(sig)) = (session_key, reply.signature.as_deref()) {
                            self.continuity.set_signature(key, sig);
                        }
                        info!(
                            model = %record.id,
                            candidate = idx,
                            tool_calls = reply.tool_calls.len(),
                            "chat completed"
                        );
                        return Ok(completion(record, reply));
                    }
                    Err(e) => {
                        let is_permanent = is_permanent_error(&e);
                        warn!(
                            model = %record.id,
                            attempt = attempt + 1,
                            max_attempts = attempts,
                            permanent = is_permanent,
                            error = %e,
                            "provider call failed"
                        );
                        last_err = e;

                        if is_permanent {
                            break;
                        }

                        if attempt + 1 < attempts {
                            let delay = Duration::from_millis(100 * 2u64.pow(attempt as u32));
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
            warn!(model = %record.id, "all retries exhausted, trying next model");
        }

        Err(last_err.context("all models exhausted"))
    }
}

fn completion(record: &ModelRecord, reply: crate::models::ProviderReply) -> ChatCompletion {
    let content = if reply.content.is_empty() && !reply.tool_calls.is_empty() {
        None
    } else {
        Some(reply.content)
    };
    ChatCompletion {
        id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
        object: "chat.completion",
        created: chrono::Utc::now().timestamp(),
        model: record.id.clone(),
        choices: vec![Choice {
            index: 0,
            message: AssistantMessage {
                role: "assistant",
                content,
                tool_calls: (!reply.tool_calls.is_empty()).then_some(reply.tool_calls),
            },
            finish_reason: reply.finish_reason,
        }],
    }
}
