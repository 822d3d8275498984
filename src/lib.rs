//! # URL Shortener Core
//!
//! The redirect path of a URL shortener: cached lookups, per-client rate
//! limiting, and click counting off the request path.
//!
//! ## Architecture
//!
//! This crate follows Clean Architecture principles with clear layer separation:
//!
//! - **Domain Layer** ([`domain`]) - URL record and click entities, repository trait
//! - **Application Layer** ([`application`]) - Cache-aside store and admission limiter
//! - **Infrastructure Layer** ([`infrastructure`]) - Bounded LRU cache, task executor, in-memory repository
//! - **API Layer** ([`api`]) - REST API handlers, DTOs, and middleware
//!
//! ## Features
//!
//! - Bounded LRU cache with TTL for URL records
//! - Token bucket rate limiting per client, with bounded client tracking
//! - Asynchronous click counting on a fixed worker pool with a bounded queue
//! - Graceful shutdown draining pending clicks
//!
//! ## Quick Start
//!
//! ```bash
//! export LISTEN="0.0.0.0:3000"
//! cargo run
//! ```
//!
//! ## Configuration
//!
//! Service configuration is loaded from environment variables via [`config::Config`].
//! See [`config`] module for available options.

pub mod api;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod state;
pub mod utils;

pub mod config;
pub mod server;

pub mod routes;

pub use error::AppError;
pub use state::AppState;

/// Commonly used types for external consumers.
///
/// Re-exports frequently used types to simplify imports for library users
/// and integration tests.
pub mod prelude {
    pub use crate::application::services::{
        AdmissionLimiter, CacheAsideUrlStore, StoreError, StoreOptions,
    };
    pub use crate::domain::entities::{Click, ClickEvent, UrlRecord};
    pub use crate::domain::repositories::{RepositoryError, UrlRepository};
    pub use crate::error::AppError;
    pub use crate::infrastructure::cache::BoundedCache;
    pub use crate::infrastructure::executor::{ExecutorError, TaskExecutor};
    pub use crate::state::AppState;
}
