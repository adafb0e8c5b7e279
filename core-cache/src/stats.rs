//! Cache statistics

/// Point-in-time counters reported by the cache worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
    pub budget_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    /// Entries removed because their max-age elapsed
    pub expired: u64,
    /// Entries removed to make room for newer ones
    pub evictions: u64,
    /// Saves refused by the admission policy
    pub rejected: u64,
}

impl CacheStats {
    pub fn usage_percentage(&self) -> f64 {
        if self.budget_bytes == 0 {
            return 0.0;
        }
        (self.total_bytes as f64 / self.budget_bytes as f64) * 100.0
    }

    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            return 0.0;
        }
        self.hits as f64 / lookups as f64
    }
}
