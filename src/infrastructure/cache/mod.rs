//! In-process caching for the redirect path.
//!
//! Provides [`BoundedCache`], a fixed-capacity LRU map used both for cached
//! URL records and for the admission limiter's per-client token buckets.

mod bounded_cache;

pub use bounded_cache::{BoundedCache, CacheStats};
