//! Cache configuration

use core_runtime::{ByteBudget, CoreConfig};
use std::time::Duration;

/// Configuration for the response cache worker.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Upper bound for the sum of entry sizes (default: 32 MiB)
    pub budget: ByteBudget,

    /// Lifetime of responses without a `max-age` directive (default: 30 min)
    pub default_max_age: Duration,

    /// Interval of the background expiry sweep (default: 60s)
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            budget: ByteBudget::FALLBACK,
            default_max_age: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(mut self, budget: ByteBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_default_max_age(mut self, max_age: Duration) -> Self {
        self.default_max_age = max_age;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub(crate) fn fallback_max_age_secs(&self) -> i64 {
        i64::try_from(self.default_max_age.as_secs()).unwrap_or(i64::MAX)
    }
}

impl From<&CoreConfig> for CacheConfig {
    fn from(config: &CoreConfig) -> Self {
        Self {
            budget: config.resolved_budget(),
            default_max_age: config.default_max_age,
            sweep_interval: config.sweep_interval,
        }
    }
}
