//! Keyword rule tables for tag inference.
//!
//! The tables are plain data: a classifier walks them in order and never
//! needs to change when a category is added.

use crate::RuleError;
use serde::{Deserialize, Serialize};

/// Reserved tag appended when content contains an emphasis word.
pub const IMPORTANT_TAG: &str = "marked:important";

// Persons
const PERSON_RULES: &[(&str, &[&str])] = &[
    (
        "person:family",
        &[
            "mother", "father", "sister", "brother", "wife", "husband", "daughter",
            "grandma", "grandpa", "妈妈", "爸爸", "母亲", "父亲", "姐姐", "哥哥",
            "妹妹", "弟弟", "老婆", "老公", "儿子", "女儿", "奶奶", "爷爷",
        ],
    ),
    ("person:friend", &["friend", "classmate", "roommate", "朋友", "同学", "室友"]),
    (
        "person:colleague",
        &["boss", "colleague", "coworker", "manager", "老板", "同事", "领导"],
    ),
    ("person:teacher", &["teacher", "professor", "mentor", "老师", "教授", "导师"]),
];

// Locations
const LOCATION_RULES: &[(&str, &[&str])] = &[
    ("location:home", &["at home", "my house", "家里", "家中"]),
    ("location:work", &["office", "workplace", "公司", "办公室", "单位"]),
    ("location:school", &["school", "campus", "university", "学校", "大学", "教室"]),
    ("location:outdoors", &["park", "beach", "mountain", "公园", "海边", "山上"]),
    ("location:transit", &["airport", "hotel", "station", "机场", "酒店", "车站"]),
];

// Events
const EVENT_RULES: &[(&str, &[&str])] = &[
    ("event:meeting", &["meeting", "conference", "会议", "开会"]),
    ("event:battle", &["battle", "fight", "战斗", "打架", "决斗"]),
    ("event:birthday", &["birthday", "生日"]),
    ("event:travel", &["vacation", "travel", "journey", "旅行", "旅游", "出差"]),
    ("event:exam", &["examination", "final exam", "quiz", "考试", "测验"]),
    ("event:appointment", &["appointment", "dentist", "预约", "看病"]),
];

// Emotions
const EMOTION_RULES: &[(&str, &[&str])] = &[
    ("emotion:happy", &["happy", "glad", "excited", "开心", "高兴", "快乐"]),
    ("emotion:sad", &["sad", "upset", "crying", "难过", "伤心", "哭了"]),
    ("emotion:angry", &["angry", "furious", "annoyed", "生气", "愤怒"]),
    ("emotion:anxious", &["anxious", "worried", "nervous", "担心", "紧张", "焦虑"]),
    ("emotion:love", &["love", "adore", "喜欢", "热爱"]),
];

// Items
const ITEM_RULES: &[(&str, &[&str])] = &[
    (
        "item:food",
        &[
            "apple", "banana", "cherry", "coffee", "pizza", "noodle", "cake", "苹果",
            "香蕉", "樱桃", "咖啡", "面条", "蛋糕",
        ],
    ),
    ("item:weapon", &["sword", "rifle", "pistol", "weapon", "剑", "武器"]),
    ("item:book", &["book", "novel", "书", "小说"]),
    ("item:device", &["phone", "laptop", "computer", "手机", "电脑"]),
    ("item:pet", &["puppy", "kitten", "my cat", "my dog", "宠物", "猫", "狗"]),
];

// Time of day and relative time
const TIME_RULES: &[(&str, &[&str])] = &[
    ("time:morning", &["morning", "早上", "上午", "早晨"]),
    ("time:afternoon", &["afternoon", "下午"]),
    ("time:evening", &["evening", "tonight", "晚上", "夜里"]),
    ("time:today", &["today", "今天"]),
    ("time:tomorrow", &["tomorrow", "明天"]),
    ("time:yesterday", &["yesterday", "昨天"]),
    ("time:weekend", &["weekend", "周末"]),
];

// Ordinal occurrences ("第3次", "3rd time", "first time")
const PATTERN_RULES: &[(&str, &str)] = &[
    ("occurrence:", r"第[0-9一二三四五六七八九十百]+次"),
    ("occurrence:", r"\b[0-9]+(?:st|nd|rd|th) time\b"),
    ("occurrence:", r"\b(?:first|second|third|fourth|fifth|last) time\b"),
];

const EMPHASIS_WORDS: &[&str] = &[
    "important", "remember", "never forget", "重要", "记住", "一定要", "务必", "千万",
];

// An emphasis word directly after one of these does not count
const NEGATION_WORDS: &[&str] = &["not", "no", "don't", "不", "没", "别"];

/// A single keyword rule: the label is emitted when any keyword matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRule {
    pub label: String,
    pub keywords: Vec<String>,
}

impl TagRule {
    pub fn new(label: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            label: label.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// A regex rule: every match becomes `prefix + matched text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    pub prefix: String,
    pub pattern: String,
}

/// Complete rule set consumed by [`crate::TagClassifier`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRules {
    #[serde(default)]
    pub rules: Vec<TagRule>,

    #[serde(default)]
    pub patterns: Vec<PatternRule>,

    /// Words that add [`IMPORTANT_TAG`]
    #[serde(default)]
    pub emphasis: Vec<String>,

    /// Words that cancel an emphasis word they directly precede
    #[serde(default)]
    pub negations: Vec<String>,
}

impl Default for TagRules {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TagRules {
    /// A rule set that never produces a tag.
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            patterns: Vec::new(),
            emphasis: Vec::new(),
            negations: Vec::new(),
        }
    }

    /// Built-in bilingual tables.
    pub fn builtin() -> Self {
        let rules = [
            PERSON_RULES,
            LOCATION_RULES,
            EVENT_RULES,
            EMOTION_RULES,
            ITEM_RULES,
            TIME_RULES,
        ]
        .iter()
        .flat_map(|table| table.iter())
        .map(|(label, keywords)| TagRule::new(*label, keywords))
        .collect();

        let patterns = PATTERN_RULES
            .iter()
            .map(|(prefix, pattern)| PatternRule {
                prefix: prefix.to_string(),
                pattern: pattern.to_string(),
            })
            .collect();

        Self {
            rules,
            patterns,
            emphasis: EMPHASIS_WORDS.iter().map(|w| w.to_string()).collect(),
            negations: NEGATION_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// Parse a rule set from JSON. Missing sections are empty.
    pub fn from_json(json: &str) -> Result<Self, RuleError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Merge another rule set into this one.
    ///
    /// Keywords for an existing label are appended to that rule so the
    /// existing rule order is kept; new labels go to the end.
    pub fn extend(&mut self, other: TagRules) {
        for rule in other.rules {
            match self.rules.iter_mut().find(|r| r.label == rule.label) {
                Some(existing) => {
                    for keyword in rule.keywords {
                        if !existing.keywords.contains(&keyword) {
                            existing.keywords.push(keyword);
                        }
                    }
                }
                None => self.rules.push(rule),
            }
        }

        for pattern in other.patterns {
            if !self.patterns.contains(&pattern) {
                self.patterns.push(pattern);
            }
        }

        for word in other.emphasis {
            if !self.emphasis.contains(&word) {
                self.emphasis.push(word);
            }
        }

        for word in other.negations {
            if !self.negations.contains(&word) {
                self.negations.push(word);
            }
        }
    }

    /// Check that every keyword rule can actually match something.
    pub fn validate(&self) -> Result<(), RuleError> {
        for rule in &self.rules {
            if rule.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(RuleError::EmptyRule(rule.label.clone()));
            }
        }
        Ok(())
    }
}
