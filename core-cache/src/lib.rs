//! # Response Cache
//!
//! Byte-budgeted, TTL- and revalidation-aware HTTP response cache running in
//! its own task.
//!
//! ## Overview
//!
//! - Entries are keyed by request URL and kept in LRU order
//! - The sum of entry sizes never exceeds the [`ByteBudget`](core_runtime::ByteBudget)
//! - Lifetime comes from `Cache-Control: max-age`, else a configurable fallback
//! - Entries with `ETag` / `Last-Modified` are returned as
//!   [`CacheLookup::Revalidate`] so the caller can issue a conditional request
//! - A background sweep deletes expired entries without read pressure
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  Envelope{task_id, cmd}  ┌──────────────┐
//! │ CacheClient  │ ───────────────────────> │ CacheWorker  │
//! │ (cloneable)  │                          │  CacheStore  │
//! │ pending map  │ <─────────────────────── │  sweep timer │
//! └──────────────┘   (task_id, CacheReply)  └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_cache::{CacheClient, CacheConfig, CacheLookup};
//!
//! let cache = CacheClient::spawn(CacheConfig::default(), clock);
//! match cache.get("https://api.example.com/items").await? {
//!     CacheLookup::Fresh(entry) => serve(entry.response),
//!     CacheLookup::Revalidate(entry) => revalidate(entry),
//!     CacheLookup::Miss => fetch(),
//! }
//! ```

pub mod client;
pub mod config;
pub mod entry;
pub mod error;
pub mod snapshot;
pub mod stats;
pub mod store;
mod worker;

pub use client::{CacheClient, DEFAULT_CUSTOM_MAX_AGE};
pub use config::CacheConfig;
pub use entry::{parse_max_age, CacheEntry, NO_EXPIRY};
pub use error::{CacheError, Result};
pub use snapshot::{Progress, ResponseSnapshot};
pub use stats::CacheStats;
pub use store::{CacheLookup, CacheStore, SaveOutcome};
