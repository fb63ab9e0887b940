//! Semantic search result cache: short-lived, keyed by user and the
//! normalized query.

use crate::ActionError;
use ko_core::note::SearchRow;
use ko_guard::Clock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// How long a semantic search result stays fresh (60 seconds).
pub const DEFAULT_TTL_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    user_id: String,
    query: String,
}

impl CacheKey {
    fn new(user_id: &str, query: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            query: query.trim().to_lowercase(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    expires_at_ms: u64,
    rows: Vec<SearchRow>,
}

/// Thread-safe in-memory cache of semantic search results. Every `put`
/// drops expired entries first.
pub struct SemanticCache {
    clock: Arc<dyn Clock>,
    ttl_ms: u64,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl SemanticCache {
    pub fn new(clock: Arc<dyn Clock>, ttl_ms: u64) -> Self {
        Self {
            clock,
            ttl_ms,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a fresh result. Expired entries are dropped on the way.
    pub fn get(&self, user_id: &str, query: &str) -> Result<Option<Vec<SearchRow>>, ActionError> {
        let now = self.clock.now_ms();
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ActionError::Cache("Lock poisoned".into()))?;

        let key = CacheKey::new(user_id, query);
        match entries.get(&key) {
            Some(entry) if entry.expires_at_ms > now => Ok(Some(entry.rows.clone())),
            Some(_) => {
                entries.remove(&key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn put(&self, user_id: &str, query: &str, rows: Vec<SearchRow>) -> Result<(), ActionError> {
        let now = self.clock.now_ms();
        let expires_at_ms = now.saturating_add(self.ttl_ms);
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ActionError::Cache("Lock poisoned".into()))?;
        let dropped = purge_locked(&mut entries, now);
        if dropped > 0 {
            debug!(dropped, "semantic cache purge");
        }
        entries.insert(CacheKey::new(user_id, query), CacheEntry { expires_at_ms, rows });
        Ok(())
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn purge_expired(&self) -> Result<usize, ActionError> {
        let now = self.clock.now_ms();
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ActionError::Cache("Lock poisoned".into()))?;
        Ok(purge_locked(&mut entries, now))
    }

    pub fn clear(&self) -> Result<(), ActionError> {
        self.entries
            .lock()
            .map_err(|_| ActionError::Cache("Lock poisoned".into()))?
            .clear();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn purge_locked(entries: &mut HashMap<CacheKey, CacheEntry>, now_ms: u64) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| entry.expires_at_ms > now_ms);
    before - entries.len()
}
