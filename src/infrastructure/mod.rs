//! Infrastructure layer: the machinery behind the domain contracts.
//!
//! # Modules
//!
//! - [`cache`] - Bounded LRU cache
//! - [`executor`] - Bounded worker pool for deferred work
//! - [`persistence`] - Repository implementations

pub mod cache;
pub mod executor;
pub mod persistence;
