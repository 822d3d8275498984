//! HTTP server initialization and runtime setup.
//!
//! Builds the repository, store, limiter and click workers, serves the
//! router, and drains pending clicks on shutdown.

use crate::application::services::{AdmissionLimiter, CacheAsideUrlStore, StoreOptions};
use crate::config::Config;
use crate::domain::repositories::UrlRepository;
use crate::infrastructure::executor::TaskExecutor;
use crate::infrastructure::persistence::MemoryUrlRepository;
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use std::net::SocketAddr;
use std::sync::Arc;

/// Builds the shared application state from configuration.
///
/// The click executor is returned unstarted inside the state; the caller
/// starts it on its runtime.
pub fn build_state(config: &Config, repository: Arc<dyn UrlRepository>) -> AppState {
    let click_executor = Arc::new(TaskExecutor::new(
        "click",
        config.click_worker_count,
        config.click_queue_capacity,
    ));

    let store = Arc::new(CacheAsideUrlStore::new(
        repository,
        Arc::clone(&click_executor),
        config.cache_capacity,
        StoreOptions {
            ttl: config.cache_ttl(),
            repository_timeout: config.repository_timeout(),
        },
    ));

    let limiter = Arc::new(AdmissionLimiter::new(
        config.rate_limit_per_second,
        config.rate_limit_burst,
        config.rate_limit_max_clients,
    ));

    AppState {
        store,
        limiter,
        click_executor,
        behind_proxy: config.behind_proxy,
    }
}

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - In-memory URL repository
/// - URL cache, rate limiter and click workers
/// - Axum HTTP server
///
/// On Ctrl-C the server stops accepting connections, then pending clicks are
/// drained for at most `SHUTDOWN_TIMEOUT_SECONDS`.
///
/// # Errors
///
/// Returns an error if:
/// - The listen address is invalid
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let repository: Arc<dyn UrlRepository> = Arc::new(MemoryUrlRepository::new());
    tracing::info!("Using in-memory URL repository");

    let state = build_state(&config, repository);
    state.click_executor.start();
    let click_executor = Arc::clone(&state.click_executor);

    let app = app_router(state);

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("HTTP server stopped, draining click queue");
    if tokio::time::timeout(config.shutdown_timeout(), click_executor.shutdown())
        .await
        .is_err()
    {
        tracing::warn!(
            queued = click_executor.stats().queued,
            "Click queue not drained before shutdown timeout"
        );
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
