//! Per-session memory store for conversational agents.
//!
//! Provides:
//! - Memory record schema
//! - Capacity eviction and time-based expiry
//! - Keyword and tag search with relevance ranking
//! - Distribution statistics
//! - Atomic JSON file storage

pub mod config;
pub mod eviction;
pub mod expiry;
pub mod record;
pub mod search;
pub mod stats;
pub mod storage;
pub mod store;

mod properties;

pub use config::{ConfigError, MemoryConfig};
pub use memory_tags::{IMPORTANT_TAG, TagClassifier, TagRules, parse_tag_list};
pub use record::Memory;
pub use search::SearchHit;
pub use stats::MemoryStats;
pub use storage::JsonStorage;
pub use store::{AutoSaveOutcome, MemoryStore};

use std::collections::BTreeMap;

/// Session id to that session's records, in insertion order.
pub type Sessions = BTreeMap<String, Vec<Memory>>;
