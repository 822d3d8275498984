#![allow(dead_code)]

use axum::extract::ConnectInfo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::Layer;
use url_shortener_core::application::services::CacheAsideUrlStore;
use url_shortener_core::config::Config;
use url_shortener_core::domain::repositories::UrlRepository;
use url_shortener_core::infrastructure::persistence::MemoryUrlRepository;
use url_shortener_core::server::build_state;
use url_shortener_core::state::AppState;

/// Inserts a fixed peer address, standing in for `into_make_service_with_connect_info`.
#[derive(Clone)]
pub struct MockConnectInfoLayer;

impl<S> Layer<S> for MockConnectInfoLayer {
    type Service = MockConnectInfoService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MockConnectInfoService { inner }
    }
}

#[derive(Clone)]
pub struct MockConnectInfoService<S> {
    inner: S,
}

impl<S, B> tower::Service<axum::http::Request<B>> for MockConnectInfoService<S>
where
    S: tower::Service<axum::http::Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: axum::http::Request<B>) -> Self::Future {
        let addr: SocketAddr = "127.0.0.1:12345".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        self.inner.call(req)
    }
}

pub fn test_config() -> Config {
    Config {
        click_worker_count: 2,
        click_queue_capacity: 100,
        ..Config::default()
    }
}

/// Builds state over a fresh in-memory repository with click workers running.
pub fn create_test_state(config: &Config) -> (AppState, Arc<MemoryUrlRepository>) {
    let (state, repo) = create_idle_state(config);
    state.click_executor.start();
    (state, repo)
}

/// Like [`create_test_state`], but the click workers are never started.
pub fn create_idle_state(config: &Config) -> (AppState, Arc<MemoryUrlRepository>) {
    let repo = Arc::new(MemoryUrlRepository::new());
    let state = build_state(config, Arc::clone(&repo) as Arc<dyn UrlRepository>);
    (state, repo)
}

pub async fn create_test_url(repo: &MemoryUrlRepository, code: &str, url: &str) {
    repo.create(url, code).await.unwrap();
}

/// Waits until `code` has `expected` clicks recorded in the repository.
pub async fn wait_for_clicks(repo: &MemoryUrlRepository, code: &str, expected: i64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while repo.click_count(code) != Some(expected) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

/// Waits until the store has finished `expected` clicks, details included.
pub async fn wait_for_applied(store: &CacheAsideUrlStore, expected: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.stats().clicks_applied < expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}
