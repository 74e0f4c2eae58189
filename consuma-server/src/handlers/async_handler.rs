//! `POST /async` — the deferred endpoint. Validates the body, SSRF-checks
//! the callback URL once at acceptance (the deliverer re-checks before
//! every POST, see `consuma_core::ssrf`), persists a pending record, and
//! hands the task to the worker pool.
//!
//! Ported from `original_source/src/app/routes/async_route.py::async_endpoint`.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use consuma_core::models::RequestMode;
use consuma_core::queue::Task;

use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::{validate_callback_url, validate_input_data, validate_iterations};

#[derive(Debug, Deserialize)]
pub struct AsyncRequestBody {
    pub input_data: String,
    pub callback_url: String,
    pub iterations: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AsyncResponseBody {
    pub request_id: String,
    pub status: &'static str,
    pub message: String,
}

pub async fn post(
    State(state): State<AppState>,
    Json(body): Json<AsyncRequestBody>,
) -> Result<(axum::http::StatusCode, Json<AsyncResponseBody>), ApiError> {
    validate_input_data(&body.input_data)?;
    validate_callback_url(&body.callback_url)?;
    if let Some(iterations) = body.iterations {
        validate_iterations(iterations)?;
    }

    state.ssrf.validate(&body.callback_url).await?;

    let request_id = Uuid::new_v4().to_string();
    let iterations = body.iterations.unwrap_or(state.config.default_iterations);

    state
        .store
        .insert_request(
            &request_id,
            RequestMode::Async,
            &body.input_data,
            iterations,
            Some(&body.callback_url),
        )
        .await?;

    let task = Task {
        request_id: request_id.clone(),
        input_data: body.input_data,
        iterations,
        callback_url: body.callback_url,
    };

    state.queue.enqueue(task).map_err(|_| ApiError::QueueFull)?;

    Ok((
        axum::http::StatusCode::ACCEPTED,
        Json(AsyncResponseBody {
            request_id,
            status: "accepted",
            message: "Request accepted. Result will be delivered to callback URL.".to_owned(),
        }),
    ))
}
