//! File-backed conversation transcripts.
//!
//! Layout under the storage root:
//!
//! ```text
//! message/<session_id>/<message_id>.json
//! message/<group>/<session_id>/<message_id>.json   (nested sessions)
//! part/<message_id>/<part_id>.json
//! ```
//!
//! [`TranscriptStore`] is the only writer of these files. Each record is
//! written to a temporary sibling and renamed into place, so a reader
//! never sees a half-written JSON file. The message/part pair is NOT
//! written atomically: a message may exist with zero parts, and readers
//! must accept that.

pub mod ids;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

// ── Records ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageTime {
    pub created: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<u64>,
}

/// The provider/model pair a message was produced with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRef {
    #[serde(alias = "providerID")]
    pub provider_id: String,
    #[serde(alias = "modelID")]
    pub model_id: String,
}

impl ModelRef {
    pub fn new(provider_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            model_id: model_id.into(),
        }
    }

    /// Both halves populated.
    pub fn is_complete(&self) -> bool {
        !self.provider_id.is_empty() && !self.model_id.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePath {
    pub cwd: String,
    pub root: String,
}

/// One transcript entry, stored as `message/<session>/<id>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    #[serde(alias = "sessionID")]
    pub session_id: String,
    /// `"user"` or `"assistant"`.
    pub role: String,
    #[serde(default)]
    pub time: MessageTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<MessagePath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<BTreeMap<String, bool>>,
}

impl StoredMessage {
    /// Agent plus a complete model pair are present.
    pub fn has_full_context(&self) -> bool {
        self.agent.as_deref().is_some_and(|a| !a.is_empty())
            && self.model.as_ref().is_some_and(ModelRef::is_complete)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartTime {
    pub start: u64,
    pub end: u64,
}

/// Text content of a message, stored as `part/<message_id>/<id>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPart {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    /// Written by the system rather than the user or model.
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default)]
    pub time: PartTime,
    #[serde(alias = "messageID")]
    pub message_id: String,
    #[serde(alias = "sessionID")]
    pub session_id: String,
}

// ── Directory resolution ─────────────────────────────────────

/// Where a session's message directory was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionDir {
    /// `message/<session_id>`
    Direct(PathBuf),
    /// `message/<group>/<session_id>`
    Nested(PathBuf),
    /// Not on disk; this is where it would be created.
    Missing(PathBuf),
}

impl SessionDir {
    pub fn path(&self) -> &Path {
        match self {
            SessionDir::Direct(p) | SessionDir::Nested(p) | SessionDir::Missing(p) => p,
        }
    }

    pub fn exists(&self) -> bool {
        !matches!(self, SessionDir::Missing(_))
    }
}

// ── Store ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TranscriptStore {
    root: PathBuf,
}

impl TranscriptStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at [`crate::storage_root`].
    pub fn from_env() -> Self {
        Self::new(crate::storage_root())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn message_root(&self) -> PathBuf {
        self.root.join("message")
    }

    fn part_dir(&self, message_id: &str) -> PathBuf {
        self.root.join("part").join(message_id)
    }

    // -- session directories --------------------------------------------

    /// Locate the message directory for `session_id` without creating it.
    ///
    /// Looks for `message/<session_id>` first, then one level of grouping
    /// directories (`message/*/<session_id>`).
    pub async fn resolve_session_dir(&self, session_id: &str) -> anyhow::Result<SessionDir> {
        validate_segment(session_id)?;
        let base = self.message_root();
        let direct = base.join(session_id);

        if is_dir(&direct).await {
            return Ok(SessionDir::Direct(direct));
        }

        let mut rd = match fs::read_dir(&base).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SessionDir::Missing(direct))
            }
            Err(e) => return Err(e).with_context(|| format!("read {}", base.display())),
        };

        while let Some(entry) = rd.next_entry().await? {
            let group = entry.path();
            if !is_dir(&group).await {
                continue;
            }
            let candidate = group.join(session_id);
            if is_dir(&candidate).await {
                debug!(session_id, dir = %candidate.display(), "session found under group dir");
                return Ok(SessionDir::Nested(candidate));
            }
        }

        Ok(SessionDir::Missing(direct))
    }

    /// Resolve the session directory, creating `message/<session_id>` when
    /// it does not exist anywhere yet.
    pub async fn ensure_session_dir(&self, session_id: &str) -> anyhow::Result<PathBuf> {
        match self.resolve_session_dir(session_id).await? {
            SessionDir::Missing(path) => {
                fs::create_dir_all(&path)
                    .await
                    .with_context(|| format!("create session dir {}", path.display()))?;
                debug!(session_id, dir = %path.display(), "session dir created");
                Ok(path)
            }
            found => Ok(found.path().to_path_buf()),
        }
    }

    // -- writes ---------------------------------------------------------

    /// Write `message` as `<dir>/<id>.json`.
    pub async fn write_message(&self, dir: &Path, message: &StoredMessage) -> anyhow::Result<()> {
        validate_segment(&message.id)?;
        let path = dir.join(format!("{}.json", message.id));
        write_json(&path, message).await?;
        debug!(path = %path.display(), role = %message.role, "message written");
        Ok(())
    }

    /// Create the part directory for the owning message and write `part`.
    pub async fn write_part(&self, part: &TextPart) -> anyhow::Result<()> {
        validate_segment(&part.message_id)?;
        validate_segment(&part.id)?;
        let dir = self.part_dir(&part.message_id);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create part dir {}", dir.display()))?;
        let path = dir.join(format!("{}.json", part.id));
        write_json(&path, part).await?;
        debug!(path = %path.display(), synthetic = part.synthetic, "part written");
        Ok(())
    }

    // -- reads ----------------------------------------------------------

    /// Message files in `dir`, newest first by file name.
    pub async fn message_files(&self, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
        let mut rd = match fs::read_dir(dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("read {}", dir.display())),
        };

        let mut files = Vec::new();
        while let Some(entry) = rd.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                files.push(path);
            }
        }
        files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
        Ok(files)
    }

    /// All parseable messages of a session, newest first. Unparseable
    /// files are skipped.
    pub async fn list_messages(&self, session_id: &str) -> anyhow::Result<Vec<StoredMessage>> {
        let dir = self.resolve_session_dir(session_id).await?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for path in self.message_files(dir.path()).await? {
            match read_json::<StoredMessage>(&path).await {
                Ok(msg) => out.push(msg),
                Err(e) => debug!(path = %path.display(), error = %e, "skipping unreadable message"),
            }
        }
        Ok(out)
    }

    pub async fn read_message(
        &self,
        session_id: &str,
        message_id: &str,
    ) -> anyhow::Result<Option<StoredMessage>> {
        validate_segment(message_id)?;
        let dir = self.resolve_session_dir(session_id).await?;
        if !dir.exists() {
            return Ok(None);
        }
        let path = dir.path().join(format!("{message_id}.json"));
        match fs::metadata(&path).await {
            Ok(_) => read_json(&path).await.map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("stat {}", path.display())),
        }
    }

    /// Parts of a message in id order. A missing part directory yields an
    /// empty list.
    pub async fn list_parts(&self, message_id: &str) -> anyhow::Result<Vec<TextPart>> {
        validate_segment(message_id)?;
        let mut files = self.message_files(&self.part_dir(message_id)).await?;
        files.reverse();

        let mut parts = Vec::new();
        for path in files {
            match read_json::<TextPart>(&path).await {
                Ok(p) => parts.push(p),
                Err(e) => debug!(path = %path.display(), error = %e, "skipping unreadable part"),
            }
        }
        Ok(parts)
    }
}

// ── Helpers ──────────────────────────────────────────────────

/// Reject ids that could escape their directory.
pub fn validate_segment(s: &str) -> anyhow::Result<()> {
    let bad = s.is_empty()
        || s.contains('/')
        || s.contains('\\')
        || s.contains('\0')
        || s.contains("..");
    if bad {
        anyhow::bail!("invalid path segment: {s:?}");
    }
    Ok(())
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let body = serde_json::to_vec_pretty(value).context("serialize record")?;
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let mut file = fs::File::create(&tmp)
        .await
        .with_context(|| format!("create {}", tmp.display()))?;
    file.write_all(&body)
        .await
        .with_context(|| format!("write {}", tmp.display()))?;
    file.sync_all()
        .await
        .with_context(|| format!("sync {}", tmp.display()))?;
    drop(file);

    fs::rename(&tmp, path)
        .await
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

async fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> anyhow::Result<T> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}
