//! Capacity eviction.

use crate::record::Memory;
use std::cmp::Ordering;

/// Highest importance still considered expendable.
pub const LOW_IMPORTANCE_MAX: u8 = 3;

/// Pick the record to drop from a full session.
///
/// Low-importance records (`<= 3`) go first, least important then oldest.
/// When every record is high-importance the oldest one goes. Returns `None`
/// only for an empty slice.
pub fn select_victim(memories: &[Memory]) -> Option<usize> {
    let low = memories
        .iter()
        .enumerate()
        .filter(|(_, m)| m.importance <= LOW_IMPORTANCE_MAX)
        .min_by(|(_, a), (_, b)| by_importance_then_age(a, b))
        .map(|(i, _)| i);

    low.or_else(|| {
        memories
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.timestamp.cmp(&b.timestamp))
            .map(|(i, _)| i)
    })
}

fn by_importance_then_age(a: &Memory, b: &Memory) -> Ordering {
    a.importance
        .cmp(&b.importance)
        .then_with(|| a.timestamp.cmp(&b.timestamp))
}
