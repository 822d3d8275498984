//! Handler for short URL redirect.

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, header},
    response::{IntoResponse, Redirect},
};
use std::net::SocketAddr;

use crate::domain::entities::ClickEvent;
use crate::error::AppError;
use crate::state::AppState;
use crate::utils::client_ip::client_ip;

/// Redirects a short code to its original URL.
///
/// # Endpoint
///
/// `GET /{code}`
///
/// # Request Flow
///
/// 1. Admission is checked by [`crate::api::middleware::rate_limit`]
/// 2. The record is resolved, from cache when possible
/// 3. A click carrying the client IP, User-Agent and Referer is queued for
///    the background workers
/// 4. Return 307 Temporary Redirect
///
/// # Click Tracking
///
/// Clicks are counted asynchronously. When the click queue is full the
/// click is dropped and the redirect still succeeds.
///
/// # Errors
///
/// Returns 404 Not Found if the short code doesn't exist.
pub async fn redirect_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let click_event = ClickEvent::new(
        Some(client_ip(&headers, addr, state.behind_proxy).to_string()),
        headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok()),
        headers.get(header::REFERER).and_then(|v| v.to_str().ok()),
    );

    let record = state
        .store
        .resolve_and_count_with(&code, click_event)
        .await?;

    Ok(Redirect::temporary(&record.long_url))
}
