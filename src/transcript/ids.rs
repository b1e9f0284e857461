//! Transcript record identifiers.
//!
//! `<prefix>_<hex millis><base36 suffix>`. The hex timestamp makes file
//! names sort roughly by creation time; the suffix makes collisions
//! negligible, not impossible.

use crate::utils::{now_millis, random_base36};

pub const MESSAGE_PREFIX: &str = "msg";
pub const PART_PREFIX: &str = "prt";

const MESSAGE_SUFFIX_LEN: usize = 12;
const PART_SUFFIX_LEN: usize = 10;

pub fn message_id() -> String {
    message_id_at(now_millis())
}

pub fn part_id() -> String {
    part_id_at(now_millis())
}

pub fn message_id_at(millis: u64) -> String {
    format!("{MESSAGE_PREFIX}_{millis:x}{}", random_base36(MESSAGE_SUFFIX_LEN))
}

pub fn part_id_at(millis: u64) -> String {
    format!("{PART_PREFIX}_{millis:x}{}", random_base36(PART_SUFFIX_LEN))
}
