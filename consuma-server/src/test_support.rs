//! Shared fixture for handler tests: an in-memory store, a queue with real
//! workers, and the full router — so handler tests exercise the same
//! wiring `main` builds, the way `hook-api`'s tests call
//! `handlers::app::add_routes` directly rather than mocking it.

#![cfg(test)]

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use consuma_core::callback::CallbackDeliverer;
use consuma_core::config::AppConfig;
use consuma_core::queue::TaskQueue;
use consuma_core::ssrf::SsrfValidator;
use consuma_core::store::Store;

use crate::handlers::add_routes;
use crate::state::AppState;

pub async fn test_state() -> (Router, AppState) {
    let store = Store::connect("sqlite::memory:").await.expect("in-memory store");

    let config = Arc::new(AppConfig {
        bind_host: "127.0.0.1".to_owned(),
        bind_port: 0,
        database_url: "sqlite::memory:".to_owned(),
        default_iterations: 100,
        max_workers: 2,
        max_queue_size: 10,
        callback_timeout: Duration::from_secs(2),
        callback_max_retries: 2,
        rate_limit_requests: 500,
        rate_limit_window: Duration::from_secs(60),
        allow_private_callbacks: true,
    });

    let ssrf = SsrfValidator::new(config.allow_private_callbacks);
    let deliverer = Arc::new(
        CallbackDeliverer::new(store.clone(), ssrf, config.callback_timeout, config.callback_max_retries)
            .expect("reqwest client builds"),
    );
    let queue = Arc::new(TaskQueue::start(
        config.max_queue_size,
        config.max_workers,
        store.clone(),
        deliverer.clone(),
    ));

    let state = AppState {
        store,
        queue,
        deliverer,
        ssrf,
        config,
        started_at: Instant::now(),
        db_connected: Arc::new(AtomicBool::new(true)),
    };

    let app = add_routes(Router::new()).with_state(state.clone());
    (app, state)
}
