//! Time-expiring cache for web evidence.
//!
//! Maps a search query to previously fetched results. Entries expire
//! after a fixed TTL and the least recently used entry is evicted once
//! the cache is full.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::search::EvidenceResult;

struct CacheEntry {
    results: Vec<EvidenceResult>,
    inserted_at: Instant,
    last_used: u64,
}

/// Bounded query cache with TTL expiry and LRU eviction.
pub struct EvidenceCache {
    entries: HashMap<String, CacheEntry>,
    capacity: usize,
    ttl: Duration,
    tick: u64,
}

impl EvidenceCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            ttl,
            tick: 0,
        }
    }

    /// Look up a query. Expired entries are treated as absent and removed.
    pub fn get(&mut self, query: &str) -> Option<Vec<EvidenceResult>> {
        let expired = match self.entries.get(query) {
            Some(entry) => entry.inserted_at.elapsed() >= self.ttl,
            None => return None,
        };
        if expired {
            self.entries.remove(query);
            return None;
        }

        self.tick += 1;
        let entry = self.entries.get_mut(query)?;
        entry.last_used = self.tick;
        Some(entry.results.clone())
    }

    /// Store results for a query, evicting if the cache is full.
    pub fn put(&mut self, query: &str, results: Vec<EvidenceResult>) {
        if !self.entries.contains_key(query) && self.entries.len() >= self.capacity {
            self.evict_one();
        }

        self.tick += 1;
        self.entries.insert(
            query.to_string(),
            CacheEntry {
                results,
                inserted_at: Instant::now(),
                last_used: self.tick,
            },
        );
    }

    /// Drop expired entries first; fall back to the least recently used.
    fn evict_one(&mut self) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        if self.entries.len() < self.capacity {
            return;
        }

        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(query, _)| query.clone());
        if let Some(query) = oldest {
            self.entries.remove(&query);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
