//! Per-session reasoning continuity.
//!
//! Two independent keyspaces live here:
//!
//! * **signatures**: the provider's opaque thought signature, keyed by
//!   conversation session key, echoed back on the session's next turn;
//! * **session ids**: the id bound to a long-lived fetch instance
//!   (transport channel).
//!
//! A fetch instance can be recreated without invalidating a session's
//! signature, so the two maps are never merged. One [`ContinuityStore`]
//! is built per process and shared by reference (usually `Arc`) with
//! every request handler. No operation performs I/O or blocks beyond a
//! short map lock.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use rand::Rng;
use tracing::debug;

#[derive(Debug, Default)]
pub struct ContinuityStore {
    signatures: RwLock<HashMap<String, String>>,
    session_ids: RwLock<HashMap<String, String>>,
}

/// Entry counts for both keyspaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ContinuityStats {
    pub signatures: usize,
    pub session_ids: usize,
}

impl ContinuityStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -- thought signatures ---------------------------------------------

    /// Record the latest signature for `session_key`, replacing any
    /// previous one. Empty keys or signatures are ignored.
    pub fn set_signature(&self, session_key: &str, signature: &str) {
        if session_key.is_empty() || signature.is_empty() {
            return;
        }
        write(&self.signatures).insert(session_key.to_string(), signature.to_string());
        debug!(session_key, "thought signature stored");
    }

    pub fn get_signature(&self, session_key: &str) -> Option<String> {
        read(&self.signatures).get(session_key).cloned()
    }

    pub fn clear_signature(&self, session_key: &str) {
        if write(&self.signatures).remove(session_key).is_some() {
            debug!(session_key, "thought signature cleared");
        }
    }

    // -- fetch-instance session ids -------------------------------------

    /// Return the session id bound to `fetch_instance_id`.
    ///
    /// An explicit id always wins and replaces the binding. Without one,
    /// the existing binding is reused, or a fresh `-<n>` id is minted.
    pub fn get_or_create_session_id(
        &self,
        fetch_instance_id: &str,
        explicit_id: Option<&str>,
    ) -> String {
        let mut ids = write(&self.session_ids);

        if let Some(id) = explicit_id.filter(|s| !s.is_empty()) {
            ids.insert(fetch_instance_id.to_string(), id.to_string());
            return id.to_string();
        }

        ids.entry(fetch_instance_id.to_string())
            .or_insert_with(|| {
                let id = mint_session_id();
                debug!(fetch_instance_id, session_id = %id, "minted session id");
                id
            })
            .clone()
    }

    pub fn clear_session_id(&self, fetch_instance_id: &str) {
        write(&self.session_ids).remove(fetch_instance_id);
    }

    /// Drop everything held under `id` in both keyspaces (connection
    /// teardown).
    pub fn clear_all(&self, id: &str) {
        self.clear_signature(id);
        self.clear_session_id(id);
    }

    pub fn stats(&self) -> ContinuityStats {
        ContinuityStats {
            signatures: read(&self.signatures).len(),
            session_ids: read(&self.session_ids).len(),
        }
    }
}

fn mint_session_id() -> String {
    let n: u64 = rand::thread_rng().gen_range(0..=i64::MAX as u64);
    format!("-{n}")
}

// A panic while holding the lock cannot leave a map half-updated (every
// write is a single insert/remove), so poisoned guards are recovered.
fn read(lock: &RwLock<HashMap<String, String>>) -> RwLockReadGuard<'_, HashMap<String, String>> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write(lock: &RwLock<HashMap<String, String>>) -> RwLockWriteGuard<'_, HashMap<String, String>> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
