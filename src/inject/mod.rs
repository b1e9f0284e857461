//! Synthetic message injection into a session transcript.
//!
//! An injection writes one `user` message and one `synthetic` text part.
//! When the caller does not know the acting agent or model, they are
//! borrowed from the newest stored message of the same session that has
//! both.
//!
//! Two concurrent injections into one session may both scan before
//! either writes and so resolve the same fallback context. That race is
//! accepted, as is a message left without its part when the second write
//! fails.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::transcript::{
    ids, MessagePath, MessageTime, ModelRef, PartTime, StoredMessage, TextPart, TranscriptStore,
};

/// Agent recorded when neither the caller nor the transcript names one.
pub const DEFAULT_AGENT: &str = "general";

/// Metadata the caller knows about the turn being injected.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct InjectContext {
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub model: Option<ModelRef>,
    #[serde(default)]
    pub path: Option<MessagePath>,
    #[serde(default)]
    pub tools: Option<BTreeMap<String, bool>>,
}

impl InjectContext {
    fn has_agent(&self) -> bool {
        self.agent.as_deref().is_some_and(|a| !a.is_empty())
    }

    fn has_model(&self) -> bool {
        self.model.as_ref().is_some_and(ModelRef::is_complete)
    }

    /// Agent, provider and model are all known.
    pub fn is_complete(&self) -> bool {
        self.has_agent() && self.has_model()
    }
}

/// Records produced by a successful injection.
#[derive(Debug, Clone, PartialEq)]
pub struct Injected {
    pub message: StoredMessage,
    pub part: TextPart,
}

/// Builds synthetic messages and hands them to the transcript store.
/// Holds no per-call state.
#[derive(Debug, Clone)]
pub struct MessageInjector {
    store: TranscriptStore,
}

impl MessageInjector {
    pub fn new(store: TranscriptStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &TranscriptStore {
        &self.store
    }

    /// Inject `text` into `session_id`. Returns `false` (and writes
    /// nothing) for blank text; returns `false` on any storage failure.
    pub async fn inject(&self, session_id: &str, text: &str, ctx: &InjectContext) -> bool {
        match self.try_inject(session_id, text, ctx).await {
            Ok(injected) => {
                info!(
                    session_id,
                    message_id = %injected.message.id,
                    agent = injected.message.agent.as_deref().unwrap_or_default(),
                    "synthetic message injected"
                );
                true
            }
            Err(e) => {
                warn!(session_id, error = %format!("{e:#}"), "message injection failed");
                false
            }
        }
    }

    /// Like [`inject`](Self::inject) but returns the written records or
    /// the underlying error.
    pub async fn try_inject(
        &self,
        session_id: &str,
        text: &str,
        ctx: &InjectContext,
    ) -> anyhow::Result<Injected> {
        if text.trim().is_empty() {
            anyhow::bail!("refusing to inject empty content");
        }

        let dir = self.store.ensure_session_dir(session_id).await?;

        let fallback = if ctx.is_complete() {
            None
        } else {
            self.find_fallback(&dir).await?
        };
        if let Some(ref fb) = fallback {
            debug!(session_id, from = %fb.id, "using fallback message context");
        }

        let now = crate::utils::now_millis();
        let message = build_message(session_id, now, ctx, fallback.as_ref());
        let part = TextPart {
            id: ids::part_id_at(now),
            kind: "text".to_string(),
            text: text.to_string(),
            synthetic: true,
            time: PartTime {
                start: now,
                end: now,
            },
            message_id: message.id.clone(),
            session_id: session_id.to_string(),
        };

        self.store.write_message(&dir, &message).await?;
        self.store.write_part(&part).await?;

        Ok(Injected { message, part })
    }

    /// Newest message in `dir` whose agent and model pair are all set.
    /// Unreadable or incomplete messages are passed over.
    pub async fn find_fallback(&self, dir: &Path) -> anyhow::Result<Option<StoredMessage>> {
        for path in self.store.message_files(dir).await? {
            let Ok(raw) = tokio::fs::read_to_string(&path).await else {
                continue;
            };
            match serde_json::from_str::<StoredMessage>(&raw) {
                Ok(msg) if msg.has_full_context() => return Ok(Some(msg)),
                Ok(_) => {}
                Err(e) => debug!(path = %path.display(), error = %e, "unparseable message in fallback scan"),
            }
        }
        Ok(None)
    }
}

/// Merge caller context over fallback context, field by field. The model
/// pair is taken whole from one side, never mixed.
fn build_message(
    session_id: &str,
    now: u64,
    ctx: &InjectContext,
    fallback: Option<&StoredMessage>,
) -> StoredMessage {
    let agent = ctx
        .agent
        .clone()
        .filter(|a| !a.is_empty())
        .or_else(|| fallback.and_then(|f| f.agent.clone()))
        .unwrap_or_else(|| DEFAULT_AGENT.to_string());

    let model = ctx
        .model
        .clone()
        .filter(ModelRef::is_complete)
        .or_else(|| {
            fallback
                .and_then(|f| f.model.clone())
                .filter(ModelRef::is_complete)
        });

    let path = ctx
        .path
        .clone()
        .or_else(|| fallback.and_then(|f| f.path.clone()));

    let tools = ctx
        .tools
        .clone()
        .or_else(|| fallback.and_then(|f| f.tools.clone()));

    StoredMessage {
        id: ids::message_id_at(now),
        session_id: session_id.to_string(),
        role: "user".to_string(),
        time: MessageTime {
            created: now,
            completed: None,
        },
        agent: Some(agent),
        model,
        path,
        tools,
    }
}
