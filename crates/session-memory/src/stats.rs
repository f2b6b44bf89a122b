//! Per-session distribution summaries.

use crate::record::{MAX_IMPORTANCE, MIN_IMPORTANCE, Memory, clamp_importance};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStats {
    pub total: usize,

    /// Mean importance rounded to two decimals, 0 for an empty session
    pub avg_importance: f64,

    /// Count per importance level, always holding all five levels
    pub importance_distribution: BTreeMap<u8, usize>,

    /// Count per tag across all records
    pub tag_distribution: BTreeMap<String, usize>,

    /// Records without any tag
    pub untagged: usize,
}

impl MemoryStats {
    pub fn compute(memories: &[Memory]) -> Self {
        let mut importance_distribution: BTreeMap<u8, usize> =
            (MIN_IMPORTANCE..=MAX_IMPORTANCE).map(|level| (level, 0)).collect();
        let mut tag_distribution: BTreeMap<String, usize> = BTreeMap::new();
        let mut untagged = 0;
        let mut importance_sum: u64 = 0;

        for memory in memories {
            let importance = clamp_importance(i64::from(memory.importance));
            importance_sum += u64::from(importance);
            *importance_distribution.entry(importance).or_default() += 1;

            if memory.tags.is_empty() {
                untagged += 1;
            }
            for tag in &memory.tags {
                *tag_distribution.entry(tag.clone()).or_default() += 1;
            }
        }

        let avg_importance = if memories.is_empty() {
            0.0
        } else {
            round2(importance_sum as f64 / memories.len() as f64)
        };

        Self {
            total: memories.len(),
            avg_importance,
            importance_distribution,
            tag_distribution,
            untagged,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Tag counts with untagged records folded under `label`.
    pub fn tag_distribution_with_fallback(&self, label: &str) -> BTreeMap<String, usize> {
        let mut distribution = self.tag_distribution.clone();
        if self.untagged > 0 {
            *distribution.entry(label.to_string()).or_default() += self.untagged;
        }
        distribution
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
