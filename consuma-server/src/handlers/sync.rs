//! `POST /sync` — the inline, anti-pattern endpoint. Runs the work
//! function directly on the request path instead of handing it to the
//! worker pool; that is the deliberate point of comparison with `/async`
//! and must not be "fixed".
//!
//! Ported from `original_source/src/app/routes/sync_route.py::sync_endpoint`.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use consuma_core::models::{RequestMode, RequestStatus};
use consuma_core::work;

use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::{validate_input_data, validate_iterations};

#[derive(Debug, Deserialize)]
pub struct SyncRequestBody {
    pub input_data: String,
    pub iterations: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SyncResponseBody {
    pub request_id: String,
    pub status: &'static str,
    pub result: String,
    pub iterations: u32,
    pub duration_ms: f64,
}

pub async fn post(
    State(state): State<AppState>,
    Json(body): Json<SyncRequestBody>,
) -> Result<Json<SyncResponseBody>, ApiError> {
    validate_input_data(&body.input_data)?;
    if let Some(iterations) = body.iterations {
        validate_iterations(iterations)?;
    }

    let request_id = Uuid::new_v4().to_string();
    let iterations = body.iterations.unwrap_or(state.config.default_iterations);

    state
        .store
        .insert_request(&request_id, RequestMode::Sync, &body.input_data, iterations, None)
        .await?;

    // Intentionally blocking the request-handling executor: this IS the
    // comparison point against `/async`'s off-path `spawn_blocking`.
    let output = work::run(body.input_data.as_bytes(), iterations);

    state
        .store
        .update_request_result(&request_id, RequestStatus::Completed, &output.result, output.duration_ms)
        .await?;

    Ok(Json(SyncResponseBody {
        request_id,
        status: "completed",
        result: output.result,
        iterations,
        duration_ms: output.duration_ms,
    }))
}
