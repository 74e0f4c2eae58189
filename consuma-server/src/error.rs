//! HTTP-facing error type. Mirrors `hook-api::handlers::webhook`'s pattern
//! of mapping each failure to a `(StatusCode, Json<_>)` pair, but collected
//! into one `IntoResponse` type so every handler returns `Result<_, ApiError>`
//! instead of repeating the status/body construction inline.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use consuma_core::error::{SsrfError, StoreError, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("invalid callback URL: {0}")]
    Ssrf(#[from] SsrfError),
    #[error("Server overloaded — queue is full")]
    QueueFull,
    #[error("request not found")]
    NotFound,
    #[error("internal error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Ssrf(_) => StatusCode::BAD_REQUEST,
            ApiError::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorBody {
            detail: self.to_string(),
        });

        let mut response = (status, body).into_response();
        if matches!(self, ApiError::QueueFull) {
            response
                .headers_mut()
                .insert("Retry-After", HeaderValue::from_static("5"));
        }
        response
    }
}
