//! Repository trait for URL records and its error type.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{Click, ClickEvent, UrlRecord};

/// Failures reported by a [`UrlRepository`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("short code `{0}` not found")]
    NotFound(String),

    #[error("short code `{0}` already exists")]
    AlreadyExists(String),

    #[error("repository call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Underlying storage failure (connection loss, query error, ...).
    #[error("repository backend error: {0}")]
    Backend(String),
}

/// Source of truth for URL records.
///
/// The cache-aside store only ever talks to storage through this trait, so
/// any backend works as long as `increment_clicks` is atomic on its side.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::MemoryUrlRepository`] - in-process backend
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UrlRepository: Send + Sync {
    /// Stores a new record.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::AlreadyExists`] if `short_code` is taken.
    async fn create(&self, long_url: &str, short_code: &str) -> Result<UrlRecord, RepositoryError>;

    /// Fetches a record together with its current click count.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] if no record has `short_code`.
    async fn get_by_short_code(&self, short_code: &str) -> Result<UrlRecord, RepositoryError>;

    /// Adds one click to the record, atomically on the storage side.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] if no record has `short_code`.
    async fn increment_clicks(&self, short_code: &str) -> Result<(), RepositoryError>;

    /// Stores the client metadata of one click on the record.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] if no record has `short_code`.
    async fn record_click(&self, short_code: &str, event: &ClickEvent) -> Result<Click, RepositoryError>;

    /// Returns one page of clicks, newest first, and the total click rows.
    ///
    /// `offset` and `limit` are row counts; callers clamp them.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] if no record has `short_code`.
    async fn list_clicks(
        &self,
        short_code: &str,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Click>, u64), RepositoryError>;
}
