//! Repository implementations.
//!
//! - [`MemoryUrlRepository`] - Process-local storage for development and tests

pub mod memory_url_repository;

pub use memory_url_repository::{MemoryUrlRepository, RepositoryCalls};
