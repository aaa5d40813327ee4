//! In-memory answer cache for the analytics tools.
//!
//! Uses moka::sync::Cache with bounded capacity and a time-to-live so
//! repeated questions skip model and training work. Cleared on every
//! data rebuild.

use std::time::Duration;

use moka::sync::Cache;
use sha2::{Digest, Sha256};

use crate::tools::ToolKind;

pub struct AnswerCache {
    answers: Cache<String, String>,
}

impl AnswerCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        Self {
            answers: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_entries)
                .build(),
        }
    }

    pub fn get(&self, tool: ToolKind, query: &str) -> Option<String> {
        self.answers.get(&cache_key(tool.as_ref(), query))
    }

    pub fn insert(&self, tool: ToolKind, query: &str, answer: String) {
        self.answers.insert(cache_key(tool.as_ref(), query), answer);
    }

    pub fn clear(&self) {
        self.answers.invalidate_all();
    }

    /// Approximate entry count (pending maintenance may lag)
    pub fn entry_count(&self) -> u64 {
        self.answers.run_pending_tasks();
        self.answers.entry_count()
    }
}

/// Hex SHA-256 of `tool` + NUL + `query`
pub fn cache_key(tool: &str, query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tool.as_bytes());
    hasher.update([0u8]);
    hasher.update(query.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_deterministic() {
        let a = cache_key("ml_prediction", "predict ROI for Q3");
        let b = cache_key("ml_prediction", "predict ROI for Q3");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, cache_key("sql_query", "predict ROI for Q3"));
        // The separator keeps tool/query boundaries unambiguous
        assert_ne!(cache_key("ab", "c"), cache_key("a", "bc"));
    }

    #[test]
    fn test_insert_get_clear() {
        let cache = AnswerCache::new(10, Duration::from_secs(60));
        cache.insert(ToolKind::MlPrediction, "q", "answer".to_string());
        assert_eq!(cache.get(ToolKind::MlPrediction, "q").as_deref(), Some("answer"));
        assert!(cache.get(ToolKind::SqlQuery, "q").is_none());

        cache.clear();
        assert!(cache.get(ToolKind::MlPrediction, "q").is_none());
    }

    #[test]
    fn test_capacity_is_bounded() {
        let cache = AnswerCache::new(5, Duration::from_secs(60));
        for i in 0..50 {
            cache.insert(ToolKind::SqlQuery, &format!("question {}", i), i.to_string());
        }
        assert!(cache.entry_count() <= 5);
    }
}
