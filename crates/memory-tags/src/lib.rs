//! Rule-based tag inference for session memories.
//!
//! Provides:
//! - Keyword and pattern rule tables (data, loadable from JSON)
//! - A deterministic classifier over those tables
//! - Helpers for caller-supplied tag lists

pub mod classifier;
pub mod rules;

pub use classifier::TagClassifier;
pub use rules::{IMPORTANT_TAG, PatternRule, TagRule, TagRules};

use thiserror::Error;

/// Errors raised while loading or compiling rule tables.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("failed to parse rule table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid pattern for '{prefix}': {source}")]
    InvalidPattern {
        prefix: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule '{0}' has no keywords")]
    EmptyRule(String),
}

/// Split a comma-separated tag list, trimming and dropping blanks.
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    merge_tags(raw.split(','), std::iter::empty::<&str>())
}

/// Union of caller tags and derived tags, first occurrence wins.
pub fn merge_tags<A, B>(caller: A, derived: B) -> Vec<String>
where
    A: IntoIterator,
    A::Item: AsRef<str>,
    B: IntoIterator,
    B::Item: AsRef<str>,
{
    let mut merged: Vec<String> = Vec::new();

    let caller = caller.into_iter().map(|t| t.as_ref().trim().to_string());
    let derived = derived.into_iter().map(|t| t.as_ref().trim().to_string());

    for tag in caller.chain(derived) {
        if !tag.is_empty() && !merged.contains(&tag) {
            merged.push(tag);
        }
    }

    merged
}
