//! Prometheus metrics endpoint and HTTP tracking middleware.
//!
//! Ported near-verbatim from `rust/common/metrics`'s
//! `setup_metrics_routes`/`track_metrics`: the teacher instruments every
//! HTTP request this way, and that instrumentation is carried here too.

use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

const LATENCY_BUCKETS_MS: &[f64] = &[1.0, 5.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2000.0, 5000.0];

/// Install the Prometheus recorder and mount `/metrics` plus the request
/// tracking middleware. Call last, once every other route is registered.
pub fn setup_metrics_routes<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let recorder_handle = setup_recorder();

    router
        .route("/metrics", get(move || std::future::ready(recorder_handle.render())))
        .layer(axum::middleware::from_fn(track_metrics))
}

fn setup_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets(LATENCY_BUCKETS_MS)
        .expect("bucket list is non-empty")
        .install_recorder()
        .expect("exactly one recorder is installed per process")
}

async fn track_metrics(req: Request<Body>, next: Next) -> impl IntoResponse {
    let start = Instant::now();

    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());
    let method = req.method().clone();

    let response = next.run(req).await;

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    let status = response.status().as_u16().to_string();
    let labels = [("method", method.to_string()), ("path", path), ("status", status)];

    metrics::counter!("consuma_http_requests_total", &labels).increment(1);
    metrics::histogram!("consuma_http_request_duration_ms", &labels).record(elapsed_ms);

    response
}
