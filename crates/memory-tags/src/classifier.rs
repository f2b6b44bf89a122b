//! Table-driven tag classifier.

use crate::RuleError;
use crate::rules::{IMPORTANT_TAG, TagRule, TagRules};
use regex::Regex;

/// Derives semantic tags from memory content.
///
/// Keywords are matched as case-insensitive substrings. A keyword that
/// starts with an ASCII letter or digit must also start a word, so "book"
/// does not match "notebook". Output follows rule order and contains no
/// duplicates.
#[derive(Debug, Clone)]
pub struct TagClassifier {
    rules: Vec<TagRule>,
    patterns: Vec<(String, Regex)>,
    emphasis: Vec<String>,
    negations: Vec<String>,
}

impl Default for TagClassifier {
    fn default() -> Self {
        Self::lenient(TagRules::builtin())
    }
}

impl TagClassifier {
    /// Compile a rule set, failing on the first invalid pattern.
    pub fn new(rules: TagRules) -> Result<Self, RuleError> {
        rules.validate()?;

        let mut patterns = Vec::with_capacity(rules.patterns.len());
        for rule in &rules.patterns {
            let regex = Regex::new(&rule.pattern).map_err(|source| RuleError::InvalidPattern {
                prefix: rule.prefix.clone(),
                source,
            })?;
            patterns.push((rule.prefix.clone(), regex));
        }

        Ok(Self::assemble(rules, patterns))
    }

    /// Compile a rule set, skipping patterns that fail to compile.
    pub fn lenient(rules: TagRules) -> Self {
        let patterns = rules
            .patterns
            .iter()
            .filter_map(|rule| {
                Regex::new(&rule.pattern)
                    .ok()
                    .map(|regex| (rule.prefix.clone(), regex))
            })
            .collect();

        Self::assemble(rules, patterns)
    }

    fn assemble(rules: TagRules, patterns: Vec<(String, Regex)>) -> Self {
        let keyword_rules = rules
            .rules
            .into_iter()
            .map(|rule| TagRule {
                label: rule.label,
                keywords: rule
                    .keywords
                    .into_iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
            })
            .collect();

        Self {
            rules: keyword_rules,
            patterns,
            emphasis: normalize(rules.emphasis),
            negations: normalize(rules.negations),
        }
    }

    /// Tags for the given content. Empty when nothing matches.
    pub fn classify(&self, content: &str) -> Vec<String> {
        let text = content.to_lowercase();
        let mut tags: Vec<String> = Vec::new();

        for rule in &self.rules {
            if rule.keywords.iter().any(|k| find_keyword(&text, k).next().is_some()) {
                push_unique(&mut tags, rule.label.clone());
            }
        }

        for (prefix, regex) in &self.patterns {
            for found in regex.find_iter(&text) {
                push_unique(&mut tags, format!("{}{}", prefix, found.as_str()));
            }
        }

        let emphasized = self.emphasis.iter().any(|w| {
            find_keyword(&text, w).any(|at| !self.is_negated(&text[..at]))
        });
        if emphasized {
            push_unique(&mut tags, IMPORTANT_TAG.to_string());
        }

        tags
    }

    fn is_negated(&self, before: &str) -> bool {
        let before = before.trim_end();
        self.negations.iter().any(|n| {
            before
                .strip_suffix(n.as_str())
                .is_some_and(|rest| !starts_word(n) || !ends_word(rest))
        })
    }
}

fn normalize(words: Vec<String>) -> Vec<String> {
    words
        .into_iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Byte offsets where `keyword` occurs in `text` at a word start.
fn find_keyword<'a>(text: &'a str, keyword: &'a str) -> impl Iterator<Item = usize> + 'a {
    let bounded = starts_word(keyword);
    text.match_indices(keyword)
        .map(|(at, _)| at)
        .filter(move |&at| !bounded || !ends_word(&text[..at]))
}

fn starts_word(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_alphanumeric())
}

fn ends_word(s: &str) -> bool {
    s.chars().next_back().is_some_and(|c| c.is_ascii_alphanumeric())
}

fn push_unique(tags: &mut Vec<String>, tag: String) {
    if !tags.contains(&tag) {
        tags.push(tag);
    }
}
