//! DTOs for health check endpoint.

use serde::Serialize;

use crate::application::services::{LimiterStats, StoreStats};
use crate::infrastructure::executor::{ExecutorState, ExecutorStats};

/// Health check response with component status.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

/// Health status for each system component.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub click_queue: ClickQueueCheck,
    pub cache: CacheCheck,
    pub rate_limiter: RateLimiterCheck,
}

#[derive(Debug, Serialize)]
pub struct ClickQueueCheck {
    pub status: String,
    pub workers: usize,
    pub queued: usize,
    pub capacity: usize,
    pub processed: u64,
    pub rejected: u64,
    pub panicked: u64,
    pub clicks_applied: u64,
    pub clicks_dropped: u64,
    pub clicks_failed: u64,
    pub click_details_failed: u64,
}

impl ClickQueueCheck {
    pub fn new(executor: &ExecutorStats, store: &StoreStats) -> Self {
        let status = match executor.state {
            ExecutorState::Started => "ok",
            ExecutorState::Created => "not_started",
            ExecutorState::Stopped => "stopped",
        };

        Self {
            status: status.to_string(),
            workers: executor.worker_count,
            queued: executor.queued,
            capacity: executor.queue_capacity,
            processed: executor.completed,
            rejected: executor.rejected,
            panicked: executor.panicked,
            clicks_applied: store.clicks_applied,
            clicks_dropped: store.clicks_dropped,
            clicks_failed: store.clicks_failed,
            click_details_failed: store.click_details_failed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CacheCheck {
    pub status: String,
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub evictions: u64,
    pub hit_ratio: f64,
}

impl From<&StoreStats> for CacheCheck {
    fn from(stats: &StoreStats) -> Self {
        Self {
            status: "ok".to_string(),
            entries: stats.cache.len,
            capacity: stats.cache.capacity,
            hits: stats.cache.hits,
            misses: stats.cache.misses,
            expired: stats.expired,
            evictions: stats.cache.evictions,
            hit_ratio: stats.cache.hit_ratio(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RateLimiterCheck {
    pub status: String,
    pub rate_per_second: f64,
    pub burst: u32,
    pub tracked_clients: usize,
    pub max_clients: usize,
    pub admitted: u64,
    pub rejected: u64,
}

impl RateLimiterCheck {
    pub fn new(rate_per_second: f64, burst: u32, stats: &LimiterStats) -> Self {
        Self {
            status: "ok".to_string(),
            rate_per_second,
            burst,
            tracked_clients: stats.tracked_clients,
            max_clients: stats.max_clients,
            admitted: stats.admitted,
            rejected: stats.rejected,
        }
    }
}
