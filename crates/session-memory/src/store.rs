//! Session memory store.
//!
//! Owns the session map and the active configuration. Mutations do not
//! flush; callers batch them and then call [`MemoryStore::flush`].

use crate::Sessions;
use crate::config::MemoryConfig;
use crate::eviction::select_victim;
use crate::expiry;
use crate::record::{self, Memory, clamp_importance};
use crate::search::{self, SearchHit};
use crate::stats::MemoryStats;
use crate::storage::JsonStorage;
use anyhow::Result;
use chrono::NaiveDateTime;
use memory_tags::{TagClassifier, merge_tags};
use tracing::{debug, error, info, warn};

/// Result of a tool-driven save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoSaveOutcome {
    Saved,
    /// `auto_save_enabled` is off
    AutoSaveDisabled,
    /// Requested importance is under `importance_threshold`
    BelowThreshold { importance: i64, threshold: u8 },
    /// `enable_memory_management` is off
    ManagementDisabled,
}

impl AutoSaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved)
    }
}

#[derive(Debug)]
pub struct MemoryStore {
    sessions: Sessions,
    config: MemoryConfig,
    classifier: TagClassifier,
    storage: Option<JsonStorage>,
}

impl MemoryStore {
    /// In-memory store with no backing file.
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            sessions: Sessions::new(),
            config,
            classifier: TagClassifier::default(),
            storage: None,
        }
    }

    /// Load from storage. An unreadable file is moved aside and the store
    /// starts empty.
    pub fn open(storage: JsonStorage, config: MemoryConfig) -> Self {
        let sessions = match storage.load() {
            Ok(sessions) => sessions,
            Err(e) => {
                error!(
                    path = %storage.path(),
                    error = ?e,
                    "failed to load memories, starting empty"
                );
                if storage.path().exists() {
                    match storage.move_aside() {
                        Ok(moved) => warn!(path = %moved, "unreadable store moved aside"),
                        Err(e) => error!(error = ?e, "failed to move aside unreadable store"),
                    }
                }
                Sessions::new()
            }
        };

        Self {
            sessions,
            config,
            classifier: TagClassifier::default(),
            storage: Some(storage),
        }
    }

    /// In-memory store seeded with existing sessions.
    ///
    /// Empty sessions are dropped and importance is clamped to `[1, 5]`.
    pub fn from_sessions(mut sessions: Sessions, config: MemoryConfig) -> Self {
        sessions.retain(|_, memories| !memories.is_empty());
        for memory in sessions.values_mut().flatten() {
            memory.importance = clamp_importance(i64::from(memory.importance));
        }
        Self {
            sessions,
            ..Self::new(config)
        }
    }

    /// Replace the tag classifier.
    pub fn with_classifier(mut self, classifier: TagClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Replace the active configuration wholesale.
    pub fn apply_config(&mut self, config: MemoryConfig) {
        info!(?config, "memory config applied");
        self.config = config;
    }

    pub fn reset_config(&mut self) {
        self.apply_config(MemoryConfig::default());
    }

    /// Raw session map, regardless of the management switch.
    pub fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    pub fn storage(&self) -> Option<&JsonStorage> {
        self.storage.as_ref()
    }

    fn enabled(&self) -> bool {
        self.config.enable_memory_management
    }

    /// Add a memory stamped with the current time.
    pub fn add(&mut self, session_id: &str, content: &str, importance: i64, tags: &[String]) -> bool {
        self.add_at(session_id, content, importance, tags, record::now())
    }

    /// Add a memory stamped with `created`.
    ///
    /// Evicts one record first when the session is at capacity. Fails when
    /// management is disabled or the content is blank.
    pub fn add_at(
        &mut self,
        session_id: &str,
        content: &str,
        importance: i64,
        tags: &[String],
        created: NaiveDateTime,
    ) -> bool {
        if !self.enabled() {
            return false;
        }

        let content = content.trim();
        if content.is_empty() {
            return false;
        }

        let capacity = self.config.max_memories.max(1);
        let tags = merge_tags(tags, self.classifier.classify(content));
        let memories = self.sessions.entry(session_id.to_string()).or_default();

        if memories.len() >= capacity {
            if let Some(index) = select_victim(memories) {
                let evicted = memories.remove(index);
                debug!(
                    session = %session_id,
                    evicted = %evicted.memory_id,
                    importance = evicted.importance,
                    "evicted memory at capacity"
                );
            }
        }

        let mut memory = Memory::new(session_id, content, importance, tags, created);
        memory.memory_id = unique_id(memories, memory.memory_id);
        memories.push(memory);
        true
    }

    /// Tool-driven save, gated by `auto_save_enabled` and `importance_threshold`.
    pub fn auto_save(
        &mut self,
        session_id: &str,
        content: &str,
        importance: i64,
        tags: &[String],
    ) -> AutoSaveOutcome {
        if !self.config.auto_save_enabled {
            return AutoSaveOutcome::AutoSaveDisabled;
        }

        let threshold = self.config.importance_threshold;
        if importance < i64::from(threshold) {
            debug!(session = %session_id, importance, threshold, "auto save below threshold");
            return AutoSaveOutcome::BelowThreshold {
                importance,
                threshold,
            };
        }

        if self.add(session_id, content, importance, tags) {
            AutoSaveOutcome::Saved
        } else {
            AutoSaveOutcome::ManagementDisabled
        }
    }

    /// Records in insertion order.
    pub fn get(&self, session_id: &str) -> &[Memory] {
        if !self.enabled() {
            return &[];
        }
        self.sessions
            .get(session_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Records by importance, most important first, ties in insertion order.
    pub fn get_sorted(&self, session_id: &str) -> Vec<&Memory> {
        let mut memories: Vec<&Memory> = self.get(session_id).iter().collect();
        memories.sort_by(|a, b| b.importance.cmp(&a.importance));
        memories
    }

    pub fn len(&self, session_id: &str) -> usize {
        self.get(session_id).len()
    }

    pub fn is_empty(&self, session_id: &str) -> bool {
        self.len(session_id) == 0
    }

    fn record_mut(&mut self, session_id: &str, index: usize) -> Option<&mut Memory> {
        if !self.enabled() {
            return None;
        }
        self.sessions.get_mut(session_id)?.get_mut(index)
    }

    /// Set importance of the record at `index`, clamped to `[1, 5]`.
    pub fn update_importance(&mut self, session_id: &str, index: usize, importance: i64) -> bool {
        match self.record_mut(session_id, index) {
            Some(memory) => {
                memory.importance = clamp_importance(importance);
                true
            }
            None => false,
        }
    }

    /// Replace the content of the record at `index`. Blank text is rejected.
    pub fn edit_content(&mut self, session_id: &str, index: usize, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        match self.record_mut(session_id, index) {
            Some(memory) => {
                memory.content = text.to_string();
                true
            }
            None => false,
        }
    }

    /// Remove and return the record at `index`.
    pub fn remove(&mut self, session_id: &str, index: usize) -> Option<Memory> {
        if !self.enabled() {
            return None;
        }

        let memories = self.sessions.get_mut(session_id)?;
        if index >= memories.len() {
            return None;
        }

        let removed = memories.remove(index);
        if memories.is_empty() {
            self.sessions.remove(session_id);
        }
        Some(removed)
    }

    /// Delete every record of a session.
    pub fn clear(&mut self, session_id: &str) -> bool {
        if !self.enabled() {
            return false;
        }
        self.sessions.remove(session_id).is_some()
    }

    pub fn search(&self, session_id: &str, keyword: &str) -> Vec<&Memory> {
        search::search(self.get(session_id), keyword)
    }

    pub fn search_scored(&self, session_id: &str, keyword: &str) -> Vec<SearchHit<'_>> {
        search::search_scored(self.get(session_id), keyword)
    }

    pub fn search_by_tag(&self, session_id: &str, tag: &str) -> Vec<&Memory> {
        search::search_by_tag(self.get(session_id), tag)
    }

    pub fn stats(&self, session_id: &str) -> MemoryStats {
        MemoryStats::compute(self.get(session_id))
    }

    /// Run the expiration sweep over every session.
    pub fn expire(&mut self, now: NaiveDateTime) -> usize {
        let removed = expiry::sweep(&mut self.sessions, self.config.memory_expire_days, now);
        if removed > 0 {
            info!(removed, "expired memories swept");
        }
        removed
    }

    /// Remove records in one session created before `now - days`.
    pub fn purge_older_than(&mut self, session_id: &str, days: u32, now: NaiveDateTime) -> usize {
        if !self.enabled() {
            return 0;
        }
        let Some(cutoff) = expiry::cutoff(now, days) else {
            return 0;
        };
        let Some(memories) = self.sessions.get_mut(session_id) else {
            return 0;
        };

        let removed = expiry::retain_fresh(memories, cutoff);
        if memories.is_empty() {
            self.sessions.remove(session_id);
        }
        if removed > 0 {
            info!(session = %session_id, removed, days, "purged old memories");
        }
        removed
    }

    /// Expire stale records, then write the store to its backing file.
    pub fn flush(&mut self) -> Result<()> {
        self.expire(record::now());
        match &self.storage {
            Some(storage) => storage.save(&self.sessions),
            None => Ok(()),
        }
    }
}

fn unique_id(memories: &[Memory], base: String) -> String {
    let taken = |id: &str| memories.iter().any(|m| m.memory_id == id);
    if !taken(base.as_str()) {
        return base;
    }

    let mut n = 1;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !taken(candidate.as_str()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use memory_tags::{IMPORTANT_TAG, TagRules};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn at(day: u32, secs: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 8, day)
            .unwrap()
            .and_hms_opt(10, 0, secs)
            .unwrap()
    }

    fn config(max_memories: usize) -> MemoryConfig {
        MemoryConfig {
            max_memories,
            ..MemoryConfig::default()
        }
    }

    fn contents(memories: &[Memory]) -> Vec<&str> {
        memories.iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn test_add_and_get() {
        let mut store = MemoryStore::new(MemoryConfig::default());
        assert!(store.add("s1", "  likes green tea  ", 3, &[]));
        assert!(store.add("s1", "second", 9, &[]));

        let memories = store.get("s1");
        assert_eq!(contents(memories), vec!["likes green tea", "second"]);
        assert_eq!(memories[1].importance, 5);
        assert!(store.get("other").is_empty());
    }

    #[test]
    fn test_add_rejects_blank() {
        let mut store = MemoryStore::new(MemoryConfig::default());
        assert!(!store.add("s1", "   ", 3, &[]));
        assert!(store.sessions().is_empty());
    }

    #[test]
    fn test_tags_union_caller_and_classifier() {
        let mut store = MemoryStore::new(MemoryConfig::default());
        let tags = vec!["人物:辰林".to_string(), "item:food".to_string()];
        store.add("s1", "Remember: I like apple", 4, &tags);

        assert_eq!(
            store.get("s1")[0].tags,
            vec!["人物:辰林", "item:food", IMPORTANT_TAG]
        );
    }

    #[test]
    fn test_custom_classifier() {
        let mut store = MemoryStore::new(MemoryConfig::default())
            .with_classifier(TagClassifier::lenient(TagRules::empty()));
        store.add("s1", "Remember: I like apple", 4, &[]);
        assert!(store.get("s1")[0].tags.is_empty());
    }

    #[test]
    fn test_eviction_scenario() {
        let mut store = MemoryStore::new(config(2));
        let now = at(1, 0);
        store.add_at("s", "first low", 2, &[], now);
        store.add_at("s", "second low", 2, &[], now);
        store.add_at("s", "high", 5, &[], now);

        assert_eq!(contents(store.get("s")), vec!["second low", "high"]);
    }

    #[test]
    fn test_eviction_all_high_drops_oldest() {
        let mut store = MemoryStore::new(config(2));
        store.add_at("s", "old high", 5, &[], at(1, 0));
        store.add_at("s", "newer high", 4, &[], at(2, 0));
        store.add_at("s", "newest low", 1, &[], at(3, 0));

        assert_eq!(contents(store.get("s")), vec!["newer high", "newest low"]);
    }

    #[test]
    fn test_eviction_removes_only_one() {
        let mut store = MemoryStore::new(config(5));
        for i in 0..5 {
            store.add_at("s", &format!("m{}", i), 1, &[], at(1, i));
        }
        store.apply_config(config(2));
        store.add_at("s", "new", 1, &[], at(2, 0));

        assert_eq!(store.len("s"), 5);
        assert_eq!(store.get("s")[0].content, "m1");
    }

    #[test]
    fn test_ids_unique_within_second() {
        let mut store = MemoryStore::new(MemoryConfig::default());
        let now = at(5, 7);
        store.add_at("s", "a", 1, &[], now);
        store.add_at("s", "b", 1, &[], now);
        store.add_at("s", "c", 1, &[], now);

        let ids: Vec<&str> = store.get("s").iter().map(|m| m.memory_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["s_20240805100007", "s_20240805100007_1", "s_20240805100007_2"]
        );
    }

    #[test]
    fn test_get_sorted_is_stable() {
        let mut store = MemoryStore::new(MemoryConfig::default());
        store.add("s", "a", 2, &[]);
        store.add("s", "b", 5, &[]);
        store.add("s", "c", 2, &[]);
        store.add("s", "d", 5, &[]);

        let sorted: Vec<&str> = store.get_sorted("s").iter().map(|m| m.content.as_str()).collect();
        assert_eq!(sorted, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_update_importance() {
        let mut store = MemoryStore::new(MemoryConfig::default());
        store.add("s", "a", 2, &[]);

        assert!(store.update_importance("s", 0, 0));
        assert_eq!(store.get("s")[0].importance, 1);
        assert!(store.update_importance("s", 0, 4));
        assert_eq!(store.get("s")[0].importance, 4);
        assert!(!store.update_importance("s", 1, 4));
        assert!(!store.update_importance("missing", 0, 4));
    }

    #[test]
    fn test_edit_content_keeps_metadata() {
        let mut store = MemoryStore::new(MemoryConfig::default());
        store.add_at("s", "I like apple", 4, &[], at(1, 0));
        let before = store.get("s")[0].clone();

        assert!(store.edit_content("s", 0, " I like red apple "));
        assert!(!store.edit_content("s", 0, "  "));
        assert!(!store.edit_content("s", 3, "x"));

        let after = &store.get("s")[0];
        assert_eq!(after.content, "I like red apple");
        assert_eq!(after.timestamp, before.timestamp);
        assert_eq!(after.importance, before.importance);
        assert_eq!(after.tags, before.tags);
        assert_eq!(after.memory_id, before.memory_id);
    }

    #[test]
    fn test_remove_twice() {
        let mut store = MemoryStore::new(MemoryConfig::default());
        store.add("s", "a", 1, &[]);
        store.add("s", "b", 1, &[]);

        assert_eq!(store.remove("s", 0).unwrap().content, "a");
        assert_eq!(store.remove("s", 0).unwrap().content, "b");
        assert_eq!(store.remove("s", 0), None);
        assert!(!store.sessions().contains_key("s"));
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut store = MemoryStore::new(MemoryConfig::default());
        store.add("s", "a", 1, &[]);
        assert_eq!(store.remove("s", 1), None);
        assert_eq!(store.remove("missing", 0), None);
        assert_eq!(store.len("s"), 1);
    }

    #[test]
    fn test_clear() {
        let mut store = MemoryStore::new(MemoryConfig::default());
        assert!(!store.clear("s"));
        store.add("s", "a", 1, &[]);
        assert!(store.clear("s"));
        assert!(!store.sessions().contains_key("s"));
    }

    #[test]
    fn test_disabled_management() {
        let mut store = MemoryStore::new(MemoryConfig::default());
        store.add("s", "kept", 3, &[]);
        store.apply_config(MemoryConfig {
            enable_memory_management: false,
            ..MemoryConfig::default()
        });

        assert!(!store.add("s", "new", 3, &[]));
        assert!(store.get("s").is_empty());
        assert!(store.get_sorted("s").is_empty());
        assert!(store.search("s", "").is_empty());
        assert!(!store.update_importance("s", 0, 5));
        assert!(!store.edit_content("s", 0, "x"));
        assert_eq!(store.remove("s", 0), None);
        assert!(!store.clear("s"));
        assert!(store.stats("s").is_empty());

        store.reset_config();
        assert_eq!(contents(store.get("s")), vec!["kept"]);
    }

    #[test]
    fn test_auto_save_threshold() {
        let mut store = MemoryStore::new(MemoryConfig {
            importance_threshold: 3,
            ..MemoryConfig::default()
        });

        assert_eq!(
            store.auto_save("s", "minor", 2, &[]),
            AutoSaveOutcome::BelowThreshold {
                importance: 2,
                threshold: 3
            }
        );
        assert!(store.get("s").is_empty());

        assert!(store.auto_save("s", "major", 3, &[]).is_saved());
        assert_eq!(contents(store.get("s")), vec!["major"]);
    }

    #[test]
    fn test_auto_save_disabled() {
        let mut store = MemoryStore::new(MemoryConfig {
            auto_save_enabled: false,
            ..MemoryConfig::default()
        });
        assert_eq!(store.auto_save("s", "x", 5, &[]), AutoSaveOutcome::AutoSaveDisabled);

        store.apply_config(MemoryConfig {
            enable_memory_management: false,
            ..MemoryConfig::default()
        });
        assert_eq!(store.auto_save("s", "x", 5, &[]), AutoSaveOutcome::ManagementDisabled);
    }

    #[test]
    fn test_search_and_tags_through_store() {
        let mut store = MemoryStore::new(MemoryConfig::default());
        store.add("s", "I like apple", 3, &[]);
        store.add("s", "I like banana and apple", 3, &[]);
        store.add("s", "I like cherry", 3, &[]);

        let found: Vec<&str> = store
            .search("s", "apple banana")
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(found, vec!["I like banana and apple", "I like apple"]);
        assert_eq!(store.search("s", "").len(), 3);
        assert_eq!(store.search_by_tag("s", "item:food").len(), 3);
        assert_eq!(store.search_scored("s", "apple banana")[0].score, 2);
    }

    #[test]
    fn test_stats_through_store() {
        let mut store = MemoryStore::new(MemoryConfig::default());
        store.add("s", "note one", 2, &[]);
        store.add("s", "note two", 3, &[]);

        let stats = store.stats("s");
        assert_eq!(stats.total, 2);
        assert_eq!(stats.avg_importance, 2.5);
        assert_eq!(stats.untagged, 2);
    }

    #[test]
    fn test_expire_and_purge() {
        let mut store = MemoryStore::new(MemoryConfig {
            memory_expire_days: 10,
            ..MemoryConfig::default()
        });
        store.add_at("a", "old", 5, &[], at(1, 0));
        store.add_at("b", "old", 5, &[], at(1, 0));
        store.add_at("b", "recent", 5, &[], at(20, 0));

        assert_eq!(store.expire(at(25, 0)), 2);
        assert!(!store.sessions().contains_key("a"));
        assert_eq!(contents(store.get("b")), vec!["recent"]);

        assert_eq!(store.purge_older_than("b", 1, at(25, 0)), 1);
        assert!(store.sessions().is_empty());
        assert_eq!(store.purge_older_than("b", 1, at(25, 0)), 0);
    }

    #[test]
    fn test_flush_round_trip() {
        let dir = tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("memory_data.json")).unwrap();
        let config = MemoryConfig {
            memory_expire_days: 0,
            ..MemoryConfig::default()
        };

        let mut store = MemoryStore::open(JsonStorage::new(path.clone()), config.clone());
        store.add_at("s1", "我喜欢吃苹果", 4, &["custom".to_string()], at(1, 0));
        store.add_at("s2", "meeting tomorrow", 2, &[], at(2, 0));
        store.flush().unwrap();

        let reopened = MemoryStore::open(JsonStorage::new(path), config);
        assert_eq!(reopened.sessions(), store.sessions());
    }

    #[test]
    fn test_from_sessions_clamps_importance() {
        let mut seeded = Memory::new("s", "seeded", 3, Vec::new(), at(1, 0));
        seeded.importance = 9;
        let mut sessions = Sessions::new();
        sessions.insert("s".to_string(), vec![seeded]);
        sessions.insert("empty".to_string(), Vec::new());

        let store = MemoryStore::from_sessions(sessions, MemoryConfig::default());
        assert_eq!(store.get("s")[0].importance, 5);
        assert!(!store.sessions().contains_key("empty"));
        assert_eq!(store.stats("s").importance_distribution.len(), 5);
    }

    #[test]
    fn test_flush_sweeps_before_saving() {
        let dir = tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("memory_data.json")).unwrap();
        let config = MemoryConfig {
            memory_expire_days: 30,
            ..MemoryConfig::default()
        };

        let stale = record::now() - chrono::TimeDelta::days(60);
        let mut store = MemoryStore::open(JsonStorage::new(path.clone()), config);
        store.add_at("old", "long forgotten", 5, &[], stale);
        store.add("fresh", "just said", 2, &[]);
        store.flush().unwrap();

        let saved = JsonStorage::new(path).load().unwrap();
        assert!(!saved.contains_key("old"));
        assert_eq!(contents(&saved["fresh"]), vec!["just said"]);
        assert_eq!(&saved, store.sessions());
    }

    #[test]
    fn test_open_corrupt_starts_empty() {
        let dir = tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("memory_data.json")).unwrap();
        std::fs::write(&path, "[1, 2").unwrap();

        let storage = JsonStorage::new(path.clone());
        let mut store = MemoryStore::open(storage.clone(), MemoryConfig::default());
        assert!(store.sessions().is_empty());

        store.add("s", "fresh start", 3, &[]);
        store.flush().unwrap();
        assert_eq!(storage.load().unwrap().len(), 1);
        assert_eq!(std::fs::read_to_string(storage.corrupt_path()).unwrap(), "[1, 2");
    }

    #[test]
    fn test_flush_without_storage() {
        let mut store = MemoryStore::new(MemoryConfig::default());
        store.add("s", "a", 1, &[]);
        assert!(store.flush().is_ok());
        assert!(store.storage().is_none());
    }
}
