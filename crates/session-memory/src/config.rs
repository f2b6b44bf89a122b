//! Memory store configuration.
//!
//! A [`MemoryConfig`] is an immutable snapshot. Updates build a new
//! snapshot and hand it to [`crate::MemoryStore::apply_config`].

use anyhow::{Context, Result};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use thiserror::Error;
use tracing::warn;

pub const MAX_MEMORIES_RANGE: (i64, i64) = (1, 100);
pub const THRESHOLD_RANGE: (i64, i64) = (1, 5);
pub const EXPIRE_DAYS_RANGE: (i64, i64) = (0, 365);

/// Rejected configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} must be an integer between {min} and {max}, got {value}")]
    OutOfRange {
        key: &'static str,
        value: String,
        min: i64,
        max: i64,
    },

    #[error("{key} must be a boolean, got {value}")]
    NotBoolean { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Per-session capacity
    pub max_memories: usize,

    /// Whether tool-driven saves are accepted
    pub auto_save_enabled: bool,

    /// Minimum importance for tool-driven saves
    pub importance_threshold: u8,

    /// Age in days after which memories expire, 0 disables expiry
    pub memory_expire_days: u32,

    /// Master switch for every store operation
    pub enable_memory_management: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_memories: 100,
            auto_save_enabled: true,
            importance_threshold: 3,
            memory_expire_days: 30,
            enable_memory_management: true,
        }
    }
}

impl MemoryConfig {
    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("max_memories", self.max_memories as i64, MAX_MEMORIES_RANGE)?;
        check_range(
            "importance_threshold",
            i64::from(self.importance_threshold),
            THRESHOLD_RANGE,
        )?;
        check_range(
            "memory_expire_days",
            i64::from(self.memory_expire_days),
            EXPIRE_DAYS_RANGE,
        )?;
        Ok(())
    }

    /// Apply a partial update from raw JSON.
    ///
    /// Absent keys keep the current value. A present but invalid value is
    /// logged and replaced by the default for that key. Unknown keys are
    /// ignored.
    pub fn merge_json(&self, raw: &Value) -> Self {
        let defaults = Self::default();
        let mut merged = self.clone();

        if let Some(value) = raw.get("max_memories") {
            merged.max_memories = match int_in_range("max_memories", value, MAX_MEMORIES_RANGE) {
                Ok(v) => v as usize,
                Err(err) => rejected(err, defaults.max_memories),
            };
        }

        if let Some(value) = raw.get("auto_save_enabled") {
            merged.auto_save_enabled = match boolean("auto_save_enabled", value) {
                Ok(v) => v,
                Err(err) => rejected(err, defaults.auto_save_enabled),
            };
        }

        if let Some(value) = raw.get("importance_threshold") {
            merged.importance_threshold =
                match int_in_range("importance_threshold", value, THRESHOLD_RANGE) {
                    Ok(v) => v as u8,
                    Err(err) => rejected(err, defaults.importance_threshold),
                };
        }

        if let Some(value) = raw.get("memory_expire_days") {
            merged.memory_expire_days =
                match int_in_range("memory_expire_days", value, EXPIRE_DAYS_RANGE) {
                    Ok(v) => v as u32,
                    Err(err) => rejected(err, defaults.memory_expire_days),
                };
        }

        if let Some(value) = raw.get("enable_memory_management") {
            merged.enable_memory_management = match boolean("enable_memory_management", value) {
                Ok(v) => v,
                Err(err) => rejected(err, defaults.enable_memory_management),
            };
        }

        merged
    }

    /// Build a configuration from a JSON value on top of the defaults.
    pub fn from_json(raw: &Value) -> Self {
        Self::default().merge_json(raw)
    }

    /// Load a configuration file. A missing file yields the defaults.
    pub fn from_json_file(path: &Utf8Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let raw: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(Self::from_json(&raw))
    }
}

impl fmt::Display for MemoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let on_off = |enabled: bool| if enabled { "enabled" } else { "disabled" };

        writeln!(f, "Memory configuration:")?;
        writeln!(f, "- max memories per session: {}", self.max_memories)?;
        writeln!(f, "- auto save: {}", on_off(self.auto_save_enabled))?;
        writeln!(f, "- importance threshold: {}/5", self.importance_threshold)?;
        if self.memory_expire_days == 0 {
            writeln!(f, "- expiry: never")?;
        } else {
            writeln!(f, "- expiry: {} days", self.memory_expire_days)?;
        }
        write!(
            f,
            "- memory management: {}",
            on_off(self.enable_memory_management)
        )
    }
}

fn check_range(key: &'static str, value: i64, (min, max): (i64, i64)) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            key,
            value: value.to_string(),
            min,
            max,
        })
    }
}

fn int_in_range(key: &'static str, value: &Value, range: (i64, i64)) -> Result<i64, ConfigError> {
    match value.as_i64() {
        Some(v) => check_range(key, v, range).map(|_| v),
        None => Err(ConfigError::OutOfRange {
            key,
            value: value.to_string(),
            min: range.0,
            max: range.1,
        }),
    }
}

fn boolean(key: &'static str, value: &Value) -> Result<bool, ConfigError> {
    value.as_bool().ok_or_else(|| ConfigError::NotBoolean {
        key,
        value: value.to_string(),
    })
}

fn rejected<T: fmt::Debug>(err: ConfigError, fallback: T) -> T {
    warn!(error = %err, fallback = ?fallback, "rejected config value, using default");
    fallback
}
