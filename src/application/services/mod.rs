//! Business logic services for the application layer.

pub mod admission_limiter;
pub mod url_store;

pub use admission_limiter::{AdmissionLimiter, LimiterStats, TokenBucket};
pub use url_store::{
    CacheAsideUrlStore, ClickPage, StoreError, StoreOptions, StoreStats, clamp_click_page,
};
