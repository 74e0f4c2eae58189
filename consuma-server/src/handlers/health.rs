//! `GET /healthz`. Always 200; `status` degrades to
//! `"degraded"` rather than failing the response, so the endpoint itself
//! stays cheap to poll from a load balancer.
//!
//! Ported from `original_source/src/app/routes/health.py::healthz`.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub queue_depth: usize,
    pub active_workers: usize,
    pub db_connected: bool,
    pub uptime_seconds: f64,
}

pub async fn get(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_connected = sqlx_ping(&state).await;
    state.mark_db_connected(db_connected);

    Json(HealthResponse {
        status: if db_connected { "ok" } else { "degraded" },
        queue_depth: state.queue.queue_depth(),
        active_workers: state.queue.active_worker_count(),
        db_connected,
        uptime_seconds: state.uptime_seconds(),
    })
}

async fn sqlx_ping(state: &AppState) -> bool {
    state.store.ping().await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn reports_ok_with_zero_load() {
        let (app, _state) = test_state().await;
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["queue_depth"], 0);
        assert_eq!(body["active_workers"], 0);
        assert_eq!(body["db_connected"], true);
    }
}
