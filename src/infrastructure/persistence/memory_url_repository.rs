//! In-process implementation of the URL repository.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::domain::entities::{Click, ClickEvent, UrlRecord};
use crate::domain::repositories::{RepositoryError, UrlRepository};

/// Number of calls made to each repository operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryCalls {
    pub creates: u64,
    pub reads: u64,
    pub increments: u64,
    pub clicks_recorded: u64,
}

/// Repository keeping every record in a process-local map.
///
/// Records do not survive a restart. Used for development runs and as the
/// call-counting backend in tests.
#[derive(Default)]
pub struct MemoryUrlRepository {
    records: Mutex<HashMap<String, UrlRecord>>,
    clicks: Mutex<HashMap<String, Vec<Click>>>,
    next_id: AtomicI64,
    next_click_id: AtomicI64,
    creates: AtomicU64,
    reads: AtomicU64,
    increments: AtomicU64,
    clicks_recorded: AtomicU64,
}

impl MemoryUrlRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, UrlRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_clicks(&self) -> MutexGuard<'_, HashMap<String, Vec<Click>>> {
        self.clicks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn url_id(&self, short_code: &str) -> Result<i64, RepositoryError> {
        self.lock()
            .get(short_code)
            .map(|r| r.id)
            .ok_or_else(|| RepositoryError::NotFound(short_code.to_string()))
    }

    /// Returns how many times each operation has been called.
    pub fn calls(&self) -> RepositoryCalls {
        RepositoryCalls {
            creates: self.creates.load(Ordering::SeqCst),
            reads: self.reads.load(Ordering::SeqCst),
            increments: self.increments.load(Ordering::SeqCst),
            clicks_recorded: self.clicks_recorded.load(Ordering::SeqCst),
        }
    }

    /// Current click count for `short_code`, without counting as a read.
    pub fn click_count(&self, short_code: &str) -> Option<i64> {
        self.lock().get(short_code).map(|r| r.click_count)
    }
}

#[async_trait]
impl UrlRepository for MemoryUrlRepository {
    async fn create(&self, long_url: &str, short_code: &str) -> Result<UrlRecord, RepositoryError> {
        self.creates.fetch_add(1, Ordering::SeqCst);

        let mut records = self.lock();
        if records.contains_key(short_code) {
            return Err(RepositoryError::AlreadyExists(short_code.to_string()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = UrlRecord::new(id, short_code, long_url, Utc::now());
        records.insert(short_code.to_string(), record.clone());

        debug!(id, short_code, "Stored url record");
        Ok(record)
    }

    async fn get_by_short_code(&self, short_code: &str) -> Result<UrlRecord, RepositoryError> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        self.lock()
            .get(short_code)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(short_code.to_string()))
    }

    async fn increment_clicks(&self, short_code: &str) -> Result<(), RepositoryError> {
        self.increments.fetch_add(1, Ordering::SeqCst);

        let mut records = self.lock();
        let record = records
            .get_mut(short_code)
            .ok_or_else(|| RepositoryError::NotFound(short_code.to_string()))?;
        record.click_count += 1;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn record_click(&self, short_code: &str, event: &ClickEvent) -> Result<Click, RepositoryError> {
        self.clicks_recorded.fetch_add(1, Ordering::SeqCst);

        let url_id = self.url_id(short_code)?;
        let click = Click {
            id: self.next_click_id.fetch_add(1, Ordering::SeqCst) + 1,
            url_id,
            ip: event.ip.clone(),
            user_agent: event.user_agent.clone(),
            referer: event.referer.clone(),
            clicked_at: Utc::now(),
        };
        self.lock_clicks()
            .entry(short_code.to_string())
            .or_default()
            .push(click.clone());
        Ok(click)
    }

    async fn list_clicks(
        &self,
        short_code: &str,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Click>, u64), RepositoryError> {
        self.url_id(short_code)?;

        let clicks = self.lock_clicks();
        let Some(rows) = clicks.get(short_code) else {
            return Ok((Vec::new(), 0));
        };

        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let take = usize::try_from(limit).unwrap_or(usize::MAX);
        // Rows are appended in click order.
        let page = rows.iter().rev().skip(skip).take(take).cloned().collect();
        Ok((page, rows.len() as u64))
    }
}
