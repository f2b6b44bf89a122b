//! Keyword and tag search with relevance ranking.

use crate::record::Memory;

/// A search match and the number of distinct keywords it contained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHit<'a> {
    pub memory: &'a Memory,
    pub score: usize,
}

/// Split a query into distinct, case-folded keywords.
pub fn keywords(query: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for word in query.split_whitespace().map(str::to_lowercase) {
        if !keywords.contains(&word) {
            keywords.push(word);
        }
    }
    keywords
}

/// Ranked matches, best first.
///
/// A record matches when its content contains any keyword. Ranking is by
/// keyword count, then importance; ties keep stored order. An empty query
/// returns every record with score 0, in stored order.
pub fn search_scored<'a>(memories: &'a [Memory], query: &str) -> Vec<SearchHit<'a>> {
    let keywords = keywords(query);
    if keywords.is_empty() {
        return memories
            .iter()
            .map(|memory| SearchHit { memory, score: 0 })
            .collect();
    }

    let mut hits: Vec<SearchHit<'a>> = memories
        .iter()
        .filter_map(|memory| {
            let content = memory.content.to_lowercase();
            let score = keywords
                .iter()
                .filter(|k| content.contains(k.as_str()))
                .count();
            (score > 0).then_some(SearchHit { memory, score })
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.memory.importance.cmp(&a.memory.importance))
    });
    hits
}

pub fn search<'a>(memories: &'a [Memory], query: &str) -> Vec<&'a Memory> {
    search_scored(memories, query)
        .into_iter()
        .map(|hit| hit.memory)
        .collect()
}

/// Records carrying exactly `tag`, most important first.
pub fn search_by_tag<'a>(memories: &'a [Memory], tag: &str) -> Vec<&'a Memory> {
    let mut found: Vec<&Memory> = memories.iter().filter(|m| m.has_tag(tag)).collect();
    found.sort_by(|a, b| b.importance.cmp(&a.importance));
    found
}
