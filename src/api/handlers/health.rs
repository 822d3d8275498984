//! Handler for health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{
    CacheCheck, ClickQueueCheck, HealthChecks, HealthResponse, RateLimiterCheck,
};
use crate::state::AppState;

/// Returns service health with cache, click queue and limiter statistics.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: Click workers are running
/// - **503 Service Unavailable**: Click workers not started or shut down
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "checks": {
///     "click_queue": { "status": "ok", "workers": 3, "queued": 0, "capacity": 500, ... },
///     "cache": { "status": "ok", "entries": 42, "capacity": 10000, "hit_ratio": 0.93, ... },
///     "rate_limiter": { "status": "ok", "rate_per_second": 10.0, "burst": 20, ... }
///   }
/// }
/// ```
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let store_stats = state.store.stats();
    let executor_stats = state.click_executor.stats();
    let limiter_stats = state.limiter.stats();

    let click_queue = ClickQueueCheck::new(&executor_stats, &store_stats);
    let all_healthy = click_queue.status == "ok";

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            click_queue,
            cache: CacheCheck::from(&store_stats),
            rate_limiter: RateLimiterCheck::new(
                state.limiter.rate(),
                state.limiter.burst(),
                &limiter_stats,
            ),
        },
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
