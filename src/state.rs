//! Shared state handed to every handler.

use std::sync::Arc;

use crate::application::services::{AdmissionLimiter, CacheAsideUrlStore};
use crate::infrastructure::executor::TaskExecutor;

/// Application state cloned into each request.
///
/// The store and the limiter are shared; the executor is kept so health
/// checks can report on the click queue and shutdown can drain it.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CacheAsideUrlStore>,
    pub limiter: Arc<AdmissionLimiter>,
    pub click_executor: Arc<TaskExecutor>,
    /// Read the client address from proxy headers instead of the socket.
    pub behind_proxy: bool,
}
