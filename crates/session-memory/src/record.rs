//! Memory record schema.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// Timestamp layout stored on every record.
///
/// Fixed width, so lexical order is chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ID_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

pub const MIN_IMPORTANCE: u8 = 1;
pub const MAX_IMPORTANCE: u8 = 5;

/// A single stored memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    /// Memory content
    pub content: String,

    /// Importance from 1 (trivial) to 5 (critical)
    #[serde(deserialize_with = "deserialize_importance")]
    pub importance: u8,

    /// Creation time, `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,

    /// Session-scoped identifier
    #[serde(default)]
    pub memory_id: String,

    /// Caller-supplied and derived tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Memory {
    /// Create a memory stamped with `created`.
    pub fn new(
        session_id: &str,
        content: impl Into<String>,
        importance: i64,
        tags: Vec<String>,
        created: NaiveDateTime,
    ) -> Self {
        Self {
            content: content.into(),
            importance: clamp_importance(importance),
            timestamp: created.format(TIMESTAMP_FORMAT).to_string(),
            memory_id: memory_id(session_id, created),
            tags,
        }
    }

    /// Parsed creation time, `None` when the stored timestamp is malformed.
    pub fn created_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT).ok()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Clamp a requested importance into `[1, 5]`.
pub fn clamp_importance(value: i64) -> u8 {
    value.clamp(i64::from(MIN_IMPORTANCE), i64::from(MAX_IMPORTANCE)) as u8
}

/// Identifier derived from the session and creation second.
pub fn memory_id(session_id: &str, created: NaiveDateTime) -> String {
    format!("{}_{}", session_id, created.format(ID_TIME_FORMAT))
}

/// Current local time.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn deserialize_importance<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(clamp_importance(raw))
}
