//! Byte-budgeted LRU store.
//!
//! Synchronous and single-owner: only the cache worker touches it. The
//! invariant maintained by every mutating call is
//! `total_bytes <= budget`.

use lru::LruCache;
use tracing::{debug, trace};

use crate::entry::{is_no_store, CacheEntry};
use crate::snapshot::ResponseSnapshot;
use crate::stats::CacheStats;

/// Result of a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Miss,
    /// Live entry without validators; serve it directly.
    Fresh(CacheEntry),
    /// Live entry carrying ETag or Last-Modified; use it to revalidate.
    Revalidate(CacheEntry),
}

impl CacheLookup {
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheLookup::Miss)
    }

    pub fn entry(&self) -> Option<&CacheEntry> {
        match self {
            CacheLookup::Miss => None,
            CacheLookup::Fresh(entry) | CacheLookup::Revalidate(entry) => Some(entry),
        }
    }
}

/// Result of a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Stored { size: u64, evicted: usize },
    NotCacheable { status: u16 },
    NoStore,
    TooLarge { size: u64, budget: u64 },
}

impl SaveOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, SaveOutcome::Stored { .. })
    }
}

pub struct CacheStore {
    entries: LruCache<String, CacheEntry>,
    total_bytes: u64,
    budget: u64,
    fallback_max_age: i64,
    stats: CacheStats,
}

impl CacheStore {
    pub fn new(budget: u64, fallback_max_age: i64) -> Self {
        Self {
            entries: LruCache::unbounded(),
            total_bytes: 0,
            budget,
            fallback_max_age,
            stats: CacheStats::default(),
        }
    }

    pub fn get(&mut self, key: &str, now_ms: i64) -> CacheLookup {
        let expired = match self.entries.get(key) {
            None => {
                self.stats.misses += 1;
                return CacheLookup::Miss;
            }
            Some(entry) => entry.is_expired(now_ms),
        };

        if expired {
            trace!(key, "dropping expired entry on lookup");
            self.remove_entry(key);
            self.stats.expired += 1;
            self.stats.misses += 1;
            return CacheLookup::Miss;
        }

        self.stats.hits += 1;
        match self.entries.peek(key) {
            Some(entry) if entry.has_validators() => CacheLookup::Revalidate(entry.clone()),
            Some(entry) => CacheLookup::Fresh(entry.clone()),
            None => CacheLookup::Miss,
        }
    }

    pub fn save(&mut self, key: &str, response: ResponseSnapshot, now_ms: i64) -> SaveOutcome {
        self.save_with_max_age(key, response, now_ms, None)
    }

    /// Save with an explicit lifetime overriding the response headers.
    pub fn save_with_max_age(
        &mut self,
        key: &str,
        response: ResponseSnapshot,
        now_ms: i64,
        max_age: Option<i64>,
    ) -> SaveOutcome {
        if response.status != 200 {
            return SaveOutcome::NotCacheable {
                status: response.status,
            };
        }
        if response.header("cache-control").is_some_and(is_no_store) {
            return SaveOutcome::NoStore;
        }

        let mut entry = CacheEntry::from_response(response, now_ms, self.fallback_max_age);
        if let Some(max_age) = max_age {
            entry.max_age_seconds = max_age;
        }

        let size = entry.size_bytes;
        if size >= self.budget {
            debug!(key, size, budget = self.budget, "entry exceeds cache budget");
            self.stats.rejected += 1;
            return SaveOutcome::TooLarge {
                size,
                budget: self.budget,
            };
        }

        self.remove_entry(key);
        let evicted = self.evict_until_fits(size);
        self.total_bytes += size;
        self.entries.put(key.to_string(), entry);

        SaveOutcome::Stored { size, evicted }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.remove_entry(key)
    }

    /// Drop everything; returns the number of entries removed.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.total_bytes = 0;
        count
    }

    /// Delete expired entries; returns the number removed.
    pub fn sweep(&mut self, now_ms: i64) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now_ms))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove_entry(key);
        }
        self.stats.expired += expired.len() as u64;
        expired.len()
    }

    /// Change the budget, evicting as needed to honour it.
    pub fn set_budget(&mut self, budget: u64) -> usize {
        self.budget = budget;
        self.evict_until_fits(0)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            total_bytes: self.total_bytes,
            budget_bytes: self.budget,
            ..self.stats.clone()
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove_entry(&mut self, key: &str) -> bool {
        match self.entries.pop(key) {
            Some(entry) => {
                self.total_bytes -= entry.size_bytes;
                true
            }
            None => false,
        }
    }

    fn evict_until_fits(&mut self, incoming: u64) -> usize {
        let mut evicted = 0;
        while self.total_bytes + incoming > self.budget {
            let Some((key, entry)) = self.entries.pop_lru() else {
                break;
            };
            trace!(key = %key, size = entry.size_bytes, "evicting least recently used entry");
            self.total_bytes -= entry.size_bytes;
            evicted += 1;
        }
        self.stats.evictions += evicted as u64;
        evicted
    }
}
