//! Shared utility helpers.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

static CALL_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Current Unix time in milliseconds.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Generate `len` random characters from `[0-9a-z]`.
pub fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// Tool-call id for calls converted in a batch: timestamp plus a
/// process-wide monotonic counter, so ids never repeat within a batch.
pub fn batch_call_id() -> String {
    let n = CALL_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("call_{}_{}", now_millis(), n)
}

/// Tool-call id for a single streamed call: timestamp plus a short
/// random suffix.
pub fn single_call_id() -> String {
    format!("call_{}_{}", now_millis(), random_base36(7))
}

/// Truncate a string to `max` bytes, appending `…` if trimmed.
pub fn truncate_str(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

/// `true` when `value` parses as an enabled flag (`1`, `true`, `yes`).
pub fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
