//! Application layer: the services handlers call into.
//!
//! # Available Services
//!
//! - [`services::url_store::CacheAsideUrlStore`] - Cached URL lookups and deferred click counting
//! - [`services::admission_limiter::AdmissionLimiter`] - Per-client request admission

pub mod services;
