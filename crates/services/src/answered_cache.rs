//! Per-participant cache of answered question indices.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use survey_core::model::QuestionIndex;

pub const DEFAULT_ANSWERED_TTL_SECS: i64 = 30;

#[derive(Debug, Clone)]
struct CacheEntry {
    answered: BTreeSet<QuestionIndex>,
    fetched_at: DateTime<Utc>,
}

/// Time-bounded cache keyed by normalized participant key.
///
/// Entries are served while younger than the TTL; callers pass `now` so the
/// services clock drives expiry.
#[derive(Debug)]
pub struct AnsweredCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Default for AnsweredCache {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_ANSWERED_TTL_SECS))
    }
}

impl AnsweredCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached set for `key` if it is still fresh at `now`.
    #[must_use]
    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<BTreeSet<QuestionIndex>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|entry| now.signed_duration_since(entry.fetched_at) < self.ttl)
            .map(|entry| entry.answered.clone())
    }

    pub fn put(&self, key: &str, answered: BTreeSet<QuestionIndex>, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            key.to_owned(),
            CacheEntry {
                answered,
                fetched_at: now,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
    }
}
