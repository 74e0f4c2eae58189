//! Process-wide shared state handed to every handler via axum's
//! `State` extractor, the same role `PgQueue` plays as handler state in
//! `hook-api`, just carrying more of it since this service does its own
//! work execution and delivery instead of only enqueuing to a remote
//! worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use consuma_core::callback::CallbackDeliverer;
use consuma_core::config::AppConfig;
use consuma_core::queue::TaskQueue;
use consuma_core::ssrf::SsrfValidator;
use consuma_core::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub queue: Arc<TaskQueue>,
    pub deliverer: Arc<CallbackDeliverer>,
    pub ssrf: SsrfValidator,
    pub config: Arc<AppConfig>,
    pub started_at: Instant,
    pub db_connected: Arc<AtomicBool>,
}

impl AppState {
    pub fn mark_db_connected(&self, connected: bool) {
        self.db_connected.store(connected, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}
