//! Upstream provider clients.
//!
//! Defines the [`ProviderClient`] trait, the request/reply types that flow
//! through it, and the two wire dialects ([`OpenAiClient`],
//! [`GeminiClient`]). Retry and fallback live in [`crate::relay`].

pub mod gemini;
pub mod openai;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::router::{ModelRecord, ProviderFormat};

pub use crate::normalize::{ChatMessage, ToolCall};
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

// ---------------------------------------------------------------------------
// Request / reply
// ---------------------------------------------------------------------------

/// One completion request, already bound to a concrete model.
#[derive(Debug, Clone, Copy)]
pub struct ProviderRequest<'a> {
    pub messages: &'a [ChatMessage],
    /// OpenAI-format tool definitions.
    pub tools: &'a [Value],
    /// Thought signature to replay (Gemini only).
    pub signature: Option<&'a str>,
}

/// The assistant turn produced by a provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    /// Opaque reasoning token to store for the next turn.
    pub signature: Option<String>,
    pub finish_reason: String,
}

impl ProviderReply {
    /// OpenAI finish reason implied by the reply when the upstream gave none.
    pub fn default_finish_reason(&self) -> &'static str {
        if self.tool_calls.is_empty() {
            "stop"
        } else {
            "tool_calls"
        }
    }
}

// ---------------------------------------------------------------------------
// ProviderClient trait
// ---------------------------------------------------------------------------

/// Implemented by every upstream dialect.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Send one request and return the assistant turn.
    async fn complete(&self, req: &ProviderRequest<'_>) -> anyhow::Result<ProviderReply>;

    fn format(&self) -> ProviderFormat;
}

/// Build the client for a resolved model.
pub fn build_client(record: &ModelRecord) -> anyhow::Result<Box<dyn ProviderClient>> {
    let api_key = record.resolve_api_key();
    let http = http_client()?;
    match record.format {
        ProviderFormat::Gemini => {
            let endpoint = record
                .endpoint
                .clone()
                .unwrap_or_else(|| gemini::DEFAULT_ENDPOINT.to_string());
            Ok(Box::new(GeminiClient::with_client(
                http,
                api_key,
                endpoint,
                record.model.clone(),
            )))
        }
        ProviderFormat::OpenAi => {
            let endpoint = match record.endpoint.clone() {
                Some(ep) => ep,
                None => openai::default_endpoint(&record.provider)
                    .map(String::from)
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "provider '{}' has no default endpoint; set `endpoint` for model '{}'",
                            record.provider,
                            record.id
                        )
                    })?,
            };
            Ok(Box::new(OpenAiClient::with_client(
                http,
                api_key,
                endpoint,
                record.model.clone(),
            )))
        }
    }
}

fn http_client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(90))
        .connect_timeout(Duration::from_secs(10))
        .build()?)
}

/// Check if an error represents a permanent HTTP failure that should not
/// be retried (auth errors, bad request, not found).
///
/// Parses status codes from error messages like "OpenAI API returned 401: …"
pub fn is_permanent_error(err: &anyhow::Error) -> bool {
    let msg = format!("{err:#}");
    ["400", "401", "403", "404", "422"]
        .iter()
        .any(|code| msg.contains(&format!("returned {code}")))
}

/// Shared non-success handling: `<label> API returned <status>: <body>`.
pub(crate) async fn check_status(
    resp: reqwest::Response,
    label: &str,
) -> anyhow::Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    anyhow::bail!(
        "{label} API returned {status}: {}",
        crate::utils::truncate_str(&text, 500)
    )
}
