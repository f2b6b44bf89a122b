//! Time-based expiration.

use crate::Sessions;
use crate::record::Memory;
use chrono::{NaiveDateTime, TimeDelta};
use tracing::debug;

/// `now - days`, or `None` when that lies before the representable range.
pub fn cutoff(now: NaiveDateTime, days: u32) -> Option<NaiveDateTime> {
    now.checked_sub_signed(TimeDelta::days(i64::from(days)))
}

/// Whether the record was created strictly before `cutoff`.
///
/// Malformed timestamps never expire.
pub fn is_expired(memory: &Memory, cutoff: NaiveDateTime) -> bool {
    memory.created_at().is_some_and(|created| created < cutoff)
}

/// Drop expired records from one list, returning how many were removed.
pub fn retain_fresh(memories: &mut Vec<Memory>, cutoff: NaiveDateTime) -> usize {
    let before = memories.len();
    memories.retain(|m| !is_expired(m, cutoff));
    before - memories.len()
}

/// Sweep every session, deleting sessions left empty.
///
/// No-op when `expire_days` is 0.
pub fn sweep(sessions: &mut Sessions, expire_days: u32, now: NaiveDateTime) -> usize {
    if expire_days == 0 {
        return 0;
    }
    let Some(cutoff) = cutoff(now, expire_days) else {
        return 0;
    };

    let mut removed = 0;
    sessions.retain(|session_id, memories| {
        let dropped = retain_fresh(memories, cutoff);
        if dropped > 0 {
            debug!(session = %session_id, dropped, "expired memories");
        }
        removed += dropped;
        !memories.is_empty()
    });
    removed
}
