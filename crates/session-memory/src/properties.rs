//! Property-based tests for store invariants.
//!
//! - Capacity is restored after every add
//! - Eviction never takes a high-importance record while a low one exists
//! - Sorted listings are non-increasing in importance
//! - An empty query returns the whole session
