//! Per-client rate limiting middleware.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use serde_json::json;
use std::net::SocketAddr;
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::client_ip::client_ip;

/// Admits or rejects a request through the shared [`AdmissionLimiter`].
///
/// Clients are keyed by IP address, taken from the socket peer address or,
/// when [`AppState::behind_proxy`] is set, from forwarding headers.
/// Rejected requests receive `429 Too Many Requests` and never reach the handler.
///
/// # Example
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/{code}", get(redirect_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit::layer));
/// ```
///
/// [`AdmissionLimiter`]: crate::application::services::AdmissionLimiter
pub async fn layer(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(request.headers(), addr, state.behind_proxy);
    let client_key = ip.to_string();

    if !state.limiter.admit(&client_key) {
        debug!(client = %client_key, path = %request.uri().path(), "Too many requests");
        return Err(AppError::too_many_requests(
            "Too many requests",
            json!({ "retry_after_seconds": retry_after_seconds(state.limiter.rate()) }),
        ));
    }

    Ok(next.run(request).await)
}

/// Seconds until one token has been refilled, rounded up.
fn retry_after_seconds(rate: f64) -> u64 {
    (1.0 / rate).ceil().max(1.0) as u64
}
