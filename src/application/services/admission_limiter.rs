//! Per-client admission control using token buckets.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::Instant;
use tracing::debug;

use crate::infrastructure::cache::BoundedCache;

/// Token bucket for a single client.
///
/// Starts full. Refills continuously at `rate` tokens per second up to
/// `burst`, and every admitted request spends one token.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(rate: f64, burst: f64, now: Instant) -> Self {
        Self {
            rate,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last_refill: now,
            }),
        }
    }

    /// Refills for the time elapsed since the last call, then tries to take a token.
    fn try_acquire(&self, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        // Instants older than the last refill add nothing.
        let elapsed = now.saturating_duration_since(state.last_refill);
        if !elapsed.is_zero() {
            state.tokens = (state.tokens + elapsed.as_secs_f64() * self.rate).min(self.burst);
            state.last_refill = now;
        }

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Snapshot of limiter counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimiterStats {
    pub admitted: u64,
    pub rejected: u64,
    pub tracked_clients: usize,
    pub max_clients: usize,
}

/// Decides per request whether a client may proceed.
///
/// One [`TokenBucket`] per client key, kept in a [`BoundedCache`] so the set of
/// tracked clients never exceeds `max_clients`. When a client's bucket is
/// evicted, its next request starts from a fresh, full bucket: throttling
/// history is traded for bounded memory.
///
/// Only the cache lookup is shared between clients; refill-and-consume locks
/// the client's own bucket.
pub struct AdmissionLimiter {
    rate: f64,
    burst: f64,
    buckets: BoundedCache<String, Arc<TokenBucket>>,
    admitted: AtomicU64,
    rejected: AtomicU64,
}

impl AdmissionLimiter {
    /// Creates a limiter allowing `rate` requests per second with bursts of
    /// up to `burst`, tracking at most `max_clients` clients.
    ///
    /// Non-positive `rate` and zero `burst` or `max_clients` are clamped to 1.
    pub fn new(rate: f64, burst: u32, max_clients: usize) -> Self {
        let rate = if rate > 0.0 { rate } else { 1.0 };
        Self {
            rate,
            burst: f64::from(burst.max(1)),
            buckets: BoundedCache::new(max_clients),
            admitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Admits or rejects one request from `client_key`.
    pub fn admit(&self, client_key: &str) -> bool {
        self.admit_at(client_key, Instant::now())
    }

    /// Like [`admit`](Self::admit), evaluated at `now`.
    pub fn admit_at(&self, client_key: &str, now: Instant) -> bool {
        let bucket = self
            .buckets
            .get_or_insert_with(client_key, || {
                Arc::new(TokenBucket::new(self.rate, self.burst, now))
            });

        let admitted = bucket.try_acquire(now);
        if admitted {
            self.admitted.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("url_shortener_admission_total", "decision" => "admitted")
                .increment(1);
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("url_shortener_admission_total", "decision" => "rejected")
                .increment(1);
            debug!(client = client_key, "Request rejected by rate limiter");
        }
        metrics::gauge!("url_shortener_active_rate_limiters").set(self.buckets.len() as f64);

        admitted
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn burst(&self) -> u32 {
        self.burst as u32
    }

    pub fn stats(&self) -> LimiterStats {
        LimiterStats {
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            tracked_clients: self.buckets.len(),
            max_clients: self.buckets.capacity(),
        }
    }
}
