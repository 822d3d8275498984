//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /{code}`          - Short link redirect (rate limited)
//! - `GET  /health`          - Click queue, cache and limiter statistics
//! - `POST /api/urls`        - Register a short code
//! - `GET  /api/urls/{code}` - Inspect a short code without counting a click
//! - `GET  /api/urls/{code}/clicks` - Paged click details, newest first
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Rate limiting** - Per-client token bucket on redirects
//! - **Path normalization** - Trailing slash handling

use crate::api::handlers::{
    create_url_handler, get_url_handler, health_handler, list_clicks_handler, redirect_handler,
};
use crate::api::middleware::rate_limit;
use crate::state::AppState;
use axum::routing::{get, post};
use axum::{Router, middleware};
use tower::Layer;
use tower_http::LatencyUnit;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Constructs the application router with all routes and middleware.
///
/// The rate limiter reads the client address from `ConnectInfo`, so the
/// router must be served with `into_make_service_with_connect_info::<SocketAddr>`.
pub fn app_router(state: AppState) -> NormalizePath<Router> {
    let redirect = Router::new()
        .route("/{code}", get(redirect_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::layer,
        ));

    let api = Router::new()
        .route("/urls", post(create_url_handler))
        .route("/urls/{code}", get(get_url_handler))
        .route("/urls/{code}/clicks", get(list_clicks_handler));

    let router = Router::new()
        .route("/health", get(health_handler))
        .merge(redirect)
        .nest("/api", api)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        );

    NormalizePathLayer::trim_trailing_slash().layer(router)
}
