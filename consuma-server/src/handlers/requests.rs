//! `GET /requests` and `GET /requests/{id}`, read-only views over the
//! store.
//!
//! Ported from `original_source/src/app/routes/requests_route.py`.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use consuma_core::error::ValidationError;
use consuma_core::models::RequestMode;

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub mode: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RequestSummary {
    pub id: String,
    pub mode: RequestMode,
    pub status: consuma_core::models::RequestStatus,
    pub duration_ms: Option<f64>,
    pub created_at: DateTime<Utc>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<RequestSummary>>, ApiError> {
    let mode = query
        .mode
        .as_deref()
        .map(|m| RequestMode::from_str(m).map_err(|_| ValidationError::InvalidMode(m.to_owned())))
        .transpose()?;

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ValidationError::Limit(limit).into());
    }

    let offset = query.offset.unwrap_or(0);
    if offset < 0 {
        return Err(ValidationError::Offset(offset).into());
    }

    let records = state.store.list_requests(mode, limit, offset).await?;
    Ok(Json(
        records
            .into_iter()
            .map(|r| RequestSummary {
                id: r.id,
                mode: r.mode,
                status: r.status,
                duration_ms: r.duration_ms,
                created_at: r.created_at,
            })
            .collect(),
    ))
}

#[derive(Debug, Serialize)]
pub struct CallbackAttemptDetail {
    pub attempt_number: u32,
    pub status_code: Option<u16>,
    pub error: Option<String>,
    pub duration_ms: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct RequestDetail {
    pub id: String,
    pub mode: RequestMode,
    pub input_data: String,
    pub iterations: u32,
    pub status: consuma_core::models::RequestStatus,
    pub result: Option<String>,
    pub duration_ms: Option<f64>,
    pub callback_url: Option<String>,
    pub callback_status: Option<consuma_core::models::CallbackStatus>,
    pub callback_attempts: u32,
    pub callback_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub delivery_trace: Vec<CallbackAttemptDetail>,
}

pub async fn detail(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<RequestDetail>, ApiError> {
    let record = state.store.get_request(&request_id).await?.ok_or(ApiError::NotFound)?;

    let delivery_trace = if record.mode == RequestMode::Async {
        state
            .store
            .get_callback_attempts(&request_id)
            .await?
            .into_iter()
            .map(|a| CallbackAttemptDetail {
                attempt_number: a.attempt_number,
                status_code: a.status_code,
                error: a.error,
                duration_ms: a.duration_ms,
                created_at: a.created_at,
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(Json(RequestDetail {
        id: record.id,
        mode: record.mode,
        input_data: record.input_data,
        iterations: record.iterations,
        status: record.status,
        result: record.result,
        duration_ms: record.duration_ms,
        callback_url: record.callback_url,
        callback_status: record.callback_status,
        callback_attempts: record.callback_attempts,
        callback_error: record.callback_error,
        created_at: record.created_at,
        completed_at: record.completed_at,
        delivery_trace,
    }))
}
