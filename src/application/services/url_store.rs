//! Cache-aside access to URL records with deferred click accounting.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::entities::{Click, ClickEvent, UrlRecord};
use crate::domain::repositories::{RepositoryError, UrlRepository};
use crate::infrastructure::cache::{BoundedCache, CacheStats};
use crate::infrastructure::executor::TaskExecutor;

/// A repository failure annotated with the store operation that hit it.
#[derive(Debug, Error)]
#[error("{op}: {source}")]
pub struct StoreError {
    op: &'static str,
    #[source]
    source: RepositoryError,
}

impl StoreError {
    pub(crate) fn new(op: &'static str, source: RepositoryError) -> Self {
        Self { op, source }
    }

    /// Name of the store operation that failed.
    pub fn op(&self) -> &'static str {
        self.op
    }

    /// The underlying repository error.
    pub fn kind(&self) -> &RepositoryError {
        &self.source
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.source, RepositoryError::NotFound(_))
    }
}

/// Tuning knobs for [`CacheAsideUrlStore`].
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// How long a cached record is served before it is re-read.
    pub ttl: Duration,
    /// Upper bound for a single repository call. The cache is never subject to it.
    pub repository_timeout: Option<Duration>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            repository_timeout: Some(Duration::from_secs(5)),
        }
    }
}

/// Lowest page number served by [`CacheAsideUrlStore::list_clicks`].
pub const MIN_CLICK_PAGE: u32 = 1;
/// Page size bounds for [`CacheAsideUrlStore::list_clicks`].
pub const MIN_CLICK_PAGE_SIZE: u32 = 5;
pub const MAX_CLICK_PAGE_SIZE: u32 = 200;

/// One page of recorded clicks, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickPage {
    pub items: Vec<Click>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
}

/// Clamps a requested page to `>= 1` and a page size to `5..=200`.
pub fn clamp_click_page(page: i64, size: i64) -> (u32, u32) {
    let page = page.clamp(i64::from(MIN_CLICK_PAGE), i64::from(u32::MAX));
    let size = size.clamp(i64::from(MIN_CLICK_PAGE_SIZE), i64::from(MAX_CLICK_PAGE_SIZE));
    (
        u32::try_from(page).unwrap_or(u32::MAX),
        u32::try_from(size).unwrap_or(MAX_CLICK_PAGE_SIZE),
    )
}

/// A cached record and the instant it stops being served.
///
/// `expires_at` is `None` when the TTL is too large to represent as an
/// instant; such entries only leave the cache through eviction or
/// invalidation.
#[derive(Debug, Clone)]
pub struct CachedUrl {
    record: UrlRecord,
    expires_at: Option<Instant>,
}

impl CachedUrl {
    fn new(record: UrlRecord, ttl: Duration) -> Self {
        Self {
            record,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    fn is_fresh(&self) -> bool {
        self.expires_at.is_none_or(|at| at > Instant::now())
    }
}

struct PendingRead {
    readers: usize,
    generation: u64,
}

/// Tracks repository reads in flight per short code.
///
/// Every invalidation bumps the generation of the code's pending reads, and
/// a read only caches its result if the generation it started with is still
/// current. Both sides touch the cache while holding the same lock, so a
/// read that raced an applied click can never put the pre-click record back.
#[derive(Default)]
struct ReadFence {
    pending: Mutex<HashMap<String, PendingRead>>,
}

impl ReadFence {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingRead>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(self: &Arc<Self>, short_code: &str) -> ReadTicket {
        let mut pending = self.lock();
        let entry = pending
            .entry(short_code.to_string())
            .or_insert(PendingRead {
                readers: 0,
                generation: 0,
            });
        entry.readers += 1;

        ReadTicket {
            fence: Arc::clone(self),
            short_code: short_code.to_string(),
            generation: entry.generation,
        }
    }

    fn invalidate(&self, cache: &BoundedCache<String, CachedUrl>, short_code: &str) {
        let mut pending = self.lock();
        if let Some(entry) = pending.get_mut(short_code) {
            entry.generation += 1;
        }
        cache.remove(short_code);
    }
}

/// Registration of one read in a [`ReadFence`], released on drop.
struct ReadTicket {
    fence: Arc<ReadFence>,
    short_code: String,
    generation: u64,
}

impl ReadTicket {
    /// Caches `entry` unless the code was invalidated since the read began.
    fn populate(&self, cache: &BoundedCache<String, CachedUrl>, entry: CachedUrl) -> bool {
        let pending = self.fence.lock();
        let current = pending.get(&self.short_code).map(|p| p.generation);
        if current != Some(self.generation) {
            return false;
        }
        cache.put(self.short_code.clone(), entry);
        true
    }
}

impl Drop for ReadTicket {
    fn drop(&mut self) {
        let mut pending = self.fence.lock();
        if let Some(entry) = pending.get_mut(&self.short_code) {
            entry.readers -= 1;
            if entry.readers == 0 {
                pending.remove(&self.short_code);
            }
        }
    }
}

/// Snapshot of store counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StoreStats {
    pub cache: CacheStats,
    pub expired: u64,
    pub clicks_scheduled: u64,
    pub clicks_dropped: u64,
    pub clicks_applied: u64,
    pub clicks_failed: u64,
    pub click_details_failed: u64,
    pub stale_reads_discarded: u64,
}

#[derive(Default)]
struct Counters {
    expired: AtomicU64,
    clicks_scheduled: AtomicU64,
    clicks_dropped: AtomicU64,
    clicks_applied: AtomicU64,
    clicks_failed: AtomicU64,
    click_details_failed: AtomicU64,
    stale_reads_discarded: AtomicU64,
}

/// Serves URL lookups from memory and records clicks off the request path.
///
/// - Reads check the cache first and fall back to the repository on a miss,
///   populating the cache with the result.
/// - Creates write to the repository first, then populate the cache.
/// - Clicks are handed to the [`TaskExecutor`]; when the increment lands the
///   cached record is dropped, never patched, so the next read sees the
///   repository's count. The click's client metadata is stored after that.
///
/// A full executor queue means the click is not counted. Click totals are
/// therefore approximate under load.
pub struct CacheAsideUrlStore<R: ?Sized = dyn UrlRepository> {
    repository: Arc<R>,
    cache: Arc<BoundedCache<String, CachedUrl>>,
    fence: Arc<ReadFence>,
    executor: Arc<TaskExecutor>,
    options: StoreOptions,
    counters: Arc<Counters>,
}

impl<R: UrlRepository + ?Sized + 'static> CacheAsideUrlStore<R> {
    /// Creates a store caching up to `cache_capacity` records.
    ///
    /// The executor is shared, not owned: the caller starts it and shuts it
    /// down.
    pub fn new(
        repository: Arc<R>,
        executor: Arc<TaskExecutor>,
        cache_capacity: usize,
        options: StoreOptions,
    ) -> Self {
        Self {
            repository,
            cache: Arc::new(BoundedCache::new(cache_capacity)),
            fence: Arc::new(ReadFence::default()),
            executor,
            options,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Creates a record, then caches it.
    ///
    /// # Errors
    ///
    /// Propagates the repository error, e.g. [`RepositoryError::AlreadyExists`]
    /// for a taken short code.
    pub async fn create(&self, long_url: &str, short_code: &str) -> Result<UrlRecord, StoreError> {
        let record = call_repository(
            self.options.repository_timeout,
            self.repository.create(long_url, short_code),
        )
        .await
        .map_err(|e| StoreError::new("store.create", e))?;

        self.cache.put(
            record.short_code.clone(),
            CachedUrl::new(record.clone(), self.options.ttl),
        );
        metrics::counter!("url_shortener_cache_operations_total", "operation" => "set", "status" => "ok")
            .increment(1);
        info!(id = record.id, short_code, "Short url created");

        Ok(record)
    }

    /// Looks a record up, from cache when possible.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] wrapping [`RepositoryError::NotFound`] for an
    /// unknown code, or whatever else the repository reported on a miss.
    pub async fn resolve(&self, short_code: &str) -> Result<UrlRecord, StoreError> {
        self.read_through("store.resolve", short_code).await
    }

    /// Resolves a record and schedules a click for it.
    ///
    /// Returns as soon as the record is known; the click is applied later by
    /// the executor, or dropped if the executor refuses it.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve). Click scheduling never fails the call.
    pub async fn resolve_and_count(&self, short_code: &str) -> Result<UrlRecord, StoreError> {
        self.resolve_and_count_with(short_code, ClickEvent::default())
            .await
    }

    /// Like [`resolve_and_count`](Self::resolve_and_count), also storing the
    /// client metadata of the click once it is applied.
    pub async fn resolve_and_count_with(
        &self,
        short_code: &str,
        event: ClickEvent,
    ) -> Result<UrlRecord, StoreError> {
        let record = self
            .read_through("store.resolve_and_count", short_code)
            .await?;
        self.schedule_click(short_code, event);
        Ok(record)
    }

    /// Lists recorded clicks for `short_code`, newest first.
    ///
    /// `page` is clamped to at least 1 and `size` to `5..=200`. Always reads
    /// the repository.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] wrapping [`RepositoryError::NotFound`] for an
    /// unknown code.
    pub async fn list_clicks(
        &self,
        short_code: &str,
        page: i64,
        size: i64,
    ) -> Result<ClickPage, StoreError> {
        let (page, size) = clamp_click_page(page, size);
        let offset = u64::from(page - 1) * u64::from(size);

        let (items, total) = call_repository(
            self.options.repository_timeout,
            self.repository.list_clicks(short_code, offset, u64::from(size)),
        )
        .await
        .map_err(|e| StoreError::new("store.list_clicks", e))?;

        Ok(ClickPage {
            items,
            page,
            size,
            total,
        })
    }

    /// Drops the cached copy of `short_code`, if any.
    ///
    /// Reads of the code already in flight will not cache their result.
    pub fn invalidate(&self, short_code: &str) {
        self.fence.invalidate(&self.cache, short_code);
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            cache: self.cache.stats(),
            expired: self.counters.expired.load(Ordering::Relaxed),
            clicks_scheduled: self.counters.clicks_scheduled.load(Ordering::Relaxed),
            clicks_dropped: self.counters.clicks_dropped.load(Ordering::Relaxed),
            clicks_applied: self.counters.clicks_applied.load(Ordering::Relaxed),
            clicks_failed: self.counters.clicks_failed.load(Ordering::Relaxed),
            click_details_failed: self.counters.click_details_failed.load(Ordering::Relaxed),
            stale_reads_discarded: self.counters.stale_reads_discarded.load(Ordering::Relaxed),
        }
    }

    async fn read_through(
        &self,
        op: &'static str,
        short_code: &str,
    ) -> Result<UrlRecord, StoreError> {
        if let Some(record) = self.cached(short_code) {
            return Ok(record);
        }

        let ticket = self.fence.enter(short_code);
        let record = call_repository(
            self.options.repository_timeout,
            self.repository.get_by_short_code(short_code),
        )
        .await
        .map_err(|e| StoreError::new(op, e))?;

        if ticket.populate(&self.cache, CachedUrl::new(record.clone(), self.options.ttl)) {
            metrics::counter!("url_shortener_cache_operations_total", "operation" => "set", "status" => "ok")
                .increment(1);
        } else {
            self.counters
                .stale_reads_discarded
                .fetch_add(1, Ordering::Relaxed);
            debug!(short_code, "Read raced a click, not cached");
        }
        Ok(record)
    }

    fn cached(&self, short_code: &str) -> Option<UrlRecord> {
        match self.cache.get(short_code) {
            Some(entry) if entry.is_fresh() => {
                debug!(short_code, "Cache HIT");
                metrics::counter!("url_shortener_cache_operations_total", "operation" => "get", "status" => "hit")
                    .increment(1);
                Some(entry.record)
            }
            Some(_) => {
                self.cache.remove(short_code);
                self.counters.expired.fetch_add(1, Ordering::Relaxed);
                debug!(short_code, "Cache EXPIRED");
                metrics::counter!("url_shortener_cache_operations_total", "operation" => "get", "status" => "expired")
                    .increment(1);
                None
            }
            None => {
                debug!(short_code, "Cache MISS");
                metrics::counter!("url_shortener_cache_operations_total", "operation" => "get", "status" => "miss")
                    .increment(1);
                None
            }
        }
    }

    fn schedule_click(&self, short_code: &str, event: ClickEvent) {
        let repository = Arc::clone(&self.repository);
        let cache = Arc::clone(&self.cache);
        let fence = Arc::clone(&self.fence);
        let counters = Arc::clone(&self.counters);
        let timeout = self.options.repository_timeout;
        let code = short_code.to_string();

        let submitted = self.executor.submit(move |ctx| async move {
            match call_repository(timeout, repository.increment_clicks(&code)).await {
                Ok(()) => {
                    fence.invalidate(&cache, &code);
                    if let Err(e) =
                        call_repository(timeout, repository.record_click(&code, &event)).await
                    {
                        counters.click_details_failed.fetch_add(1, Ordering::Relaxed);
                        warn!(short_code = %code, worker_id = ctx.worker_id(), error = %e, "Failed to store click details");
                    }
                    counters.clicks_applied.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!("url_shortener_clicks_total", "status" => "applied")
                        .increment(1);
                    debug!(short_code = %code, worker_id = ctx.worker_id(), "Click recorded");
                }
                Err(e) => {
                    counters.clicks_failed.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!("url_shortener_clicks_total", "status" => "failed")
                        .increment(1);
                    warn!(short_code = %code, worker_id = ctx.worker_id(), error = %e, "Failed to record click");
                }
            }
        });

        match submitted {
            Ok(()) => {
                self.counters.clicks_scheduled.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.counters.clicks_dropped.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("url_shortener_clicks_total", "status" => "dropped").increment(1);
                warn!(short_code, error = %e, "Click dropped");
            }
        }
    }
}

/// Awaits a repository call, bounded by `limit` when one is set.
async fn call_repository<T, F>(limit: Option<Duration>, call: F) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(RepositoryError::Timeout(limit))),
        None => call.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockUrlRepository;
    use crate::infrastructure::persistence::MemoryUrlRepository;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::Notify;

    fn started_executor(queue: usize) -> Arc<TaskExecutor> {
        let executor = Arc::new(TaskExecutor::new("clicks", 2, queue));
        executor.start();
        executor
    }

    fn memory_store(
        executor: Arc<TaskExecutor>,
    ) -> (Arc<MemoryUrlRepository>, CacheAsideUrlStore<MemoryUrlRepository>) {
        let repo = Arc::new(MemoryUrlRepository::new());
        let store = CacheAsideUrlStore::new(
            Arc::clone(&repo),
            executor,
            16,
            StoreOptions::default(),
        );
        (repo, store)
    }

    async fn wait_for_clicks<R: UrlRepository + ?Sized + 'static>(
        store: &CacheAsideUrlStore<R>,
        settled: u64,
    ) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let stats = store.stats();
                if stats.clicks_applied + stats.clicks_failed >= settled {
                    break;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_create_populates_cache() {
        let (repo, store) = memory_store(started_executor(8));

        store.create("https://a.com", "abc").await.unwrap();
        let record = store.resolve("abc").await.unwrap();

        assert_eq!(record.long_url, "https://a.com");
        assert_eq!(repo.calls().reads, 0);
    }

    #[tokio::test]
    async fn test_second_resolve_hits_cache() {
        let (repo, store) = memory_store(started_executor(8));
        repo.create("https://a.com", "abc").await.unwrap();

        let first = store.resolve("abc").await.unwrap();
        let second = store.resolve("abc").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(repo.calls().reads, 1);
        assert_eq!(store.stats().cache.hits, 1);
    }

    #[tokio::test]
    async fn test_applied_click_invalidates_cache() {
        let (repo, store) = memory_store(started_executor(8));
        store.create("https://a.com", "abc").await.unwrap();
        store.resolve("abc").await.unwrap();

        let record = store.resolve_and_count("abc").await.unwrap();
        assert_eq!(record.click_count, 0);
        wait_for_clicks(&store, 1).await;

        let refreshed = store.resolve("abc").await.unwrap();

        assert_eq!(refreshed.click_count, 1);
        assert_eq!(repo.calls().reads, 1);
        assert_eq!(repo.calls().increments, 1);
        assert_eq!(store.stats().clicks_applied, 1);
    }

    #[tokio::test]
    async fn test_resolve_unknown_code_is_not_found() {
        let (_repo, store) = memory_store(started_executor(8));

        let err = store.resolve("missing").await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.op(), "store.resolve");
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test]
    async fn test_unknown_code_schedules_no_click() {
        let (repo, store) = memory_store(started_executor(8));

        assert!(store.resolve_and_count("missing").await.is_err());

        assert_eq!(store.stats().clicks_scheduled, 0);
        assert_eq!(repo.calls().increments, 0);
    }

    #[tokio::test]
    async fn test_duplicate_create_propagates_conflict() {
        let (_repo, store) = memory_store(started_executor(8));
        store.create("https://a.com", "abc").await.unwrap();

        let err = store.create("https://b.com", "abc").await.unwrap_err();

        assert_eq!(err.op(), "store.create");
        assert_eq!(
            err.kind(),
            &RepositoryError::AlreadyExists("abc".to_string())
        );
    }

    #[tokio::test]
    async fn test_click_dropped_when_executor_refuses() {
        let executor = Arc::new(TaskExecutor::new("clicks", 1, 1));
        let (repo, store) = memory_store(executor);
        store.create("https://a.com", "abc").await.unwrap();

        let record = store.resolve_and_count("abc").await.unwrap();

        assert_eq!(record.short_code, "abc");
        assert_eq!(store.stats().clicks_dropped, 1);
        assert_eq!(repo.calls().increments, 0);
    }

    #[tokio::test]
    async fn test_failed_click_keeps_cache_entry() {
        let mut mock = MockUrlRepository::new();
        mock.expect_get_by_short_code()
            .times(1)
            .returning(|code| Ok(UrlRecord::new(1, code, "https://a.com", Utc::now())));
        mock.expect_increment_clicks()
            .times(1)
            .returning(|_| Err(RepositoryError::Backend("connection reset".to_string())));

        let store = CacheAsideUrlStore::new(
            Arc::new(mock),
            started_executor(8),
            16,
            StoreOptions::default(),
        );

        store.resolve_and_count("abc").await.unwrap();
        wait_for_clicks(&store, 1).await;
        store.resolve("abc").await.unwrap();

        let stats = store.stats();
        assert_eq!(stats.clicks_failed, 1);
        assert_eq!(stats.clicks_applied, 0);
        assert_eq!(stats.cache.hits, 1);
    }

    #[tokio::test]
    async fn test_backend_error_is_wrapped() {
        let mut mock = MockUrlRepository::new();
        mock.expect_get_by_short_code()
            .returning(|_| Err(RepositoryError::Backend("pool exhausted".to_string())));

        let store = CacheAsideUrlStore::new(
            Arc::new(mock),
            started_executor(8),
            16,
            StoreOptions::default(),
        );

        let err = store.resolve_and_count("abc").await.unwrap_err();

        assert_eq!(err.op(), "store.resolve_and_count");
        assert!(!err.is_not_found());
        assert_eq!(
            err.to_string(),
            "store.resolve_and_count: repository backend error: pool exhausted"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_reread() {
        let repo = Arc::new(MemoryUrlRepository::new());
        repo.create("https://a.com", "abc").await.unwrap();
        let store = CacheAsideUrlStore::new(
            Arc::clone(&repo),
            started_executor(8),
            16,
            StoreOptions {
                ttl: Duration::from_secs(60),
                repository_timeout: None,
            },
        );

        store.resolve("abc").await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        store.resolve("abc").await.unwrap();

        assert_eq!(repo.calls().reads, 2);
        assert_eq!(store.stats().expired, 1);
    }

    struct SlowRepository;

    #[async_trait]
    impl UrlRepository for SlowRepository {
        async fn create(&self, _long_url: &str, _short_code: &str) -> Result<UrlRecord, RepositoryError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(RepositoryError::Backend("unreachable".to_string()))
        }

        async fn get_by_short_code(&self, _short_code: &str) -> Result<UrlRecord, RepositoryError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(RepositoryError::Backend("unreachable".to_string()))
        }

        async fn increment_clicks(&self, _short_code: &str) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn record_click(&self, short_code: &str, _event: &ClickEvent) -> Result<Click, RepositoryError> {
            Err(RepositoryError::NotFound(short_code.to_string()))
        }

        async fn list_clicks(
            &self,
            _short_code: &str,
            _offset: u64,
            _limit: u64,
        ) -> Result<(Vec<Click>, u64), RepositoryError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(RepositoryError::Backend("unreachable".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_repository_times_out() {
        let store = CacheAsideUrlStore::new(
            Arc::new(SlowRepository),
            started_executor(8),
            16,
            StoreOptions {
                ttl: Duration::from_secs(60),
                repository_timeout: Some(Duration::from_millis(100)),
            },
        );

        let err = store.resolve("abc").await.unwrap_err();

        assert_eq!(
            err.kind(),
            &RepositoryError::Timeout(Duration::from_millis(100))
        );
    }

    #[tokio::test]
    async fn test_store_over_trait_object() {
        let repo: Arc<dyn UrlRepository> = Arc::new(MemoryUrlRepository::new());
        let store: CacheAsideUrlStore = CacheAsideUrlStore::new(
            repo,
            started_executor(8),
            16,
            StoreOptions::default(),
        );

        store.create("https://a.com", "dyn").await.unwrap();
        store.invalidate("dyn");

        assert_eq!(store.resolve("dyn").await.unwrap().short_code, "dyn");
        assert_eq!(store.stats().cache.misses, 1);
    }

    /// Memory repository whose next read returns its result only after
    /// `release` is notified.
    #[derive(Default)]
    struct GatedRepository {
        inner: MemoryUrlRepository,
        gate_next_read: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl UrlRepository for GatedRepository {
        async fn create(&self, long_url: &str, short_code: &str) -> Result<UrlRecord, RepositoryError> {
            self.inner.create(long_url, short_code).await
        }

        async fn get_by_short_code(&self, short_code: &str) -> Result<UrlRecord, RepositoryError> {
            let record = self.inner.get_by_short_code(short_code).await;
            if self.gate_next_read.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            record
        }

        async fn increment_clicks(&self, short_code: &str) -> Result<(), RepositoryError> {
            self.inner.increment_clicks(short_code).await
        }

        async fn record_click(&self, short_code: &str, event: &ClickEvent) -> Result<Click, RepositoryError> {
            self.inner.record_click(short_code, event).await
        }

        async fn list_clicks(
            &self,
            short_code: &str,
            offset: u64,
            limit: u64,
        ) -> Result<(Vec<Click>, u64), RepositoryError> {
            self.inner.list_clicks(short_code, offset, limit).await
        }
    }

    #[tokio::test]
    async fn test_read_racing_click_does_not_cache_stale_record() {
        let repo = Arc::new(GatedRepository::default());
        repo.inner.create("https://a.com", "abc").await.unwrap();
        repo.gate_next_read.store(true, Ordering::SeqCst);
        let store = Arc::new(CacheAsideUrlStore::new(
            Arc::clone(&repo),
            started_executor(8),
            16,
            StoreOptions::default(),
        ));

        // Holds a pre-click record until released.
        let slow_read = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.resolve("abc").await }
        });
        repo.entered.notified().await;

        store.resolve_and_count("abc").await.unwrap();
        wait_for_clicks(&store, 1).await;
        repo.release.notify_one();

        let stale = slow_read.await.unwrap().unwrap();
        assert_eq!(stale.click_count, 0);
        assert_eq!(store.stats().stale_reads_discarded, 1);

        let current = store.resolve("abc").await.unwrap();
        assert_eq!(current.click_count, 1);
    }

    #[tokio::test]
    async fn test_invalidate_during_read_skips_caching() {
        let repo = Arc::new(GatedRepository::default());
        repo.inner.create("https://a.com", "abc").await.unwrap();
        repo.gate_next_read.store(true, Ordering::SeqCst);
        let store = Arc::new(CacheAsideUrlStore::new(
            Arc::clone(&repo),
            started_executor(8),
            16,
            StoreOptions::default(),
        ));

        let slow_read = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.resolve("abc").await }
        });
        repo.entered.notified().await;
        store.invalidate("abc");
        repo.release.notify_one();
        slow_read.await.unwrap().unwrap();

        store.resolve("abc").await.unwrap();

        assert_eq!(repo.inner.calls().reads, 2);
        assert_eq!(store.stats().cache.hits, 0);
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_never_expires() {
        let repo = Arc::new(MemoryUrlRepository::new());
        let store = CacheAsideUrlStore::new(
            Arc::clone(&repo),
            started_executor(8),
            16,
            StoreOptions {
                ttl: Duration::MAX,
                repository_timeout: None,
            },
        );

        store.create("https://a.com", "abc").await.unwrap();
        store.resolve("abc").await.unwrap();
        store.resolve("abc").await.unwrap();

        assert_eq!(repo.calls().reads, 0);
        assert_eq!(store.stats().cache.hits, 2);
        assert_eq!(store.stats().expired, 0);
    }

    #[tokio::test]
    async fn test_click_details_are_recorded() {
        let (repo, store) = memory_store(started_executor(8));
        store.create("https://a.com", "abc").await.unwrap();

        store
            .resolve_and_count_with(
                "abc",
                ClickEvent::new(
                    Some("203.0.113.7".to_string()),
                    Some("Mozilla/5.0"),
                    Some("https://news.example"),
                ),
            )
            .await
            .unwrap();
        wait_for_clicks(&store, 1).await;

        let page = store.list_clicks("abc", 1, 20).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(page.items[0].user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(page.items[0].referer.as_deref(), Some("https://news.example"));
        assert_eq!(repo.calls().clicks_recorded, 1);
    }

    #[tokio::test]
    async fn test_list_clicks_clamps_paging() {
        let (_repo, store) = memory_store(started_executor(8));
        store.create("https://a.com", "abc").await.unwrap();
        for _ in 0..7 {
            store.resolve_and_count("abc").await.unwrap();
        }
        wait_for_clicks(&store, 7).await;

        let first = store.list_clicks("abc", 0, 1).await.unwrap();
        assert_eq!((first.page, first.size, first.total), (1, 5, 7));
        assert_eq!(first.items.len(), 5);

        let second = store.list_clicks("abc", 2, 1).await.unwrap();
        assert_eq!(second.items.len(), 2);
        assert!(second.items.iter().all(|c| !first.items.contains(c)));
    }

    #[test]
    fn test_clamp_click_page_bounds() {
        assert_eq!(clamp_click_page(-3, 0), (1, 5));
        assert_eq!(clamp_click_page(4, 50), (4, 50));
        assert_eq!(clamp_click_page(1, 10_000), (1, 200));
        assert_eq!(clamp_click_page(i64::MAX, i64::MIN), (u32::MAX, 5));
    }

    #[tokio::test]
    async fn test_list_clicks_unknown_code_is_not_found() {
        let (_repo, store) = memory_store(started_executor(8));

        let err = store.list_clicks("missing", 1, 10).await.unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.op(), "store.list_clicks");
    }
}
