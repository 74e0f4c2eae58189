//! Binary entry point: wires config, store, queue/workers, and the axum
//! router together, then drives the process lifecycle.
//!
//! Shaped like `hook-api::main`, generalized to a single-process split:
//! one binary does acceptance, compute dispatch, and callback delivery,
//! instead of `hook-api` and `hook-worker` as two.

mod error;
mod handlers;
mod lifecycle;
mod metrics;
mod rate_limit;
mod state;
#[cfg(test)]
mod test_support;
mod validation;

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use envconfig::Envconfig;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use consuma_core::callback::CallbackDeliverer;
use consuma_core::config::Config;
use consuma_core::queue::TaskQueue;
use consuma_core::ssrf::SsrfValidator;
use consuma_core::store::Store;

use rate_limit::RateLimiter;
use state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env()
        .expect("failed to load configuration from env")
        .into_app_config();
    let config = Arc::new(config);

    let store = Store::connect(&config.database_url)
        .await
        .expect("failed to connect to store");

    let ssrf = SsrfValidator::new(config.allow_private_callbacks);
    let deliverer = Arc::new(
        CallbackDeliverer::new(store.clone(), ssrf, config.callback_timeout, config.callback_max_retries)
            .expect("failed to build callback HTTP client"),
    );
    let queue = Arc::new(TaskQueue::start(
        config.max_queue_size,
        config.max_workers,
        store.clone(),
        deliverer.clone(),
    ));
    tracing::info!(
        max_workers = config.max_workers,
        max_queue_size = config.max_queue_size,
        "store and task queue initialized"
    );

    let rate_limiter = RateLimiter::new(config.rate_limit_requests, config.rate_limit_window);
    let maintenance = lifecycle::spawn_rate_limit_sweep(rate_limiter.clone());

    let state = AppState {
        store,
        queue,
        deliverer,
        ssrf,
        config: config.clone(),
        started_at: Instant::now(),
        db_connected: Arc::new(AtomicBool::new(true)),
    };

    let app = build_router(state.clone(), rate_limiter);
    tracing::info!("server ready");

    let bind = format!("{}:{}", config.bind_host, config.bind_port);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {bind}: {e}"));

    let serve_result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    if let Err(e) = serve_result {
        tracing::error!(error = %e, "server exited with error");
    }

    lifecycle::shutdown(&state, maintenance).await;
}

/// Caps request bodies well above the largest accepted field (`input_data`
/// at 10000 bytes plus JSON overhead), mirroring `hook-api`'s
/// `RequestBodyLimitLayer` on its `/webhook` route.
const MAX_BODY_SIZE_BYTES: usize = 64 * 1024;

fn build_router(state: AppState, rate_limiter: RateLimiter) -> Router {
    let router = handlers::add_routes(Router::new())
        .layer(axum::middleware::from_fn_with_state(rate_limiter, rate_limit::enforce))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    metrics::setup_metrics_routes(router)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
