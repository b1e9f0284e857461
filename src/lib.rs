//! modelgate: model relay with OpenAI/Gemini format normalisation,
//! reasoning continuity and transcript injection.
//!
//! This library crate re-exports modules so integration tests
//! (under `tests/`) can access them.

pub mod cli;
pub mod config;
pub mod continuity;
pub mod gateway;
pub mod inject;
pub mod models;
pub mod normalize;
pub mod relay;
pub mod router;
pub mod transcript;
pub mod utils;

use std::path::PathBuf;

/// Return the modelgate home directory (holds `config.yaml`).
///
/// Resolution order:
/// 1. `MODELGATE_HOME` environment variable
/// 2. `$HOME/.modelgate`
pub fn modelgate_home() -> PathBuf {
    if let Ok(p) = std::env::var("MODELGATE_HOME") {
        PathBuf::from(p)
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".modelgate")
    }
}

/// Root of the transcript store.
///
/// Resolution order:
/// 1. `MODELGATE_DATA_DIR` (used as-is)
/// 2. `$XDG_DATA_HOME/opencode/storage`
/// 3. the platform data dir + `opencode/storage`
pub fn storage_root() -> PathBuf {
    if let Ok(p) = std::env::var("MODELGATE_DATA_DIR") {
        if !p.is_empty() {
            return PathBuf::from(p);
        }
    }
    let base = std::env::var("XDG_DATA_HOME")
        .ok()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("opencode").join("storage")
}
