//! Domain layer: entities and repository contracts.
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Data access trait definitions
//!
//! The domain layer has no dependency on the cache, executor or HTTP layers.

pub mod entities;
pub mod repositories;
