//! Per-subsystem error types, in the style of `hook_common::pgqueue::PgQueueError`
//! and `hook_worker::error::{WebhookError, WorkerError}`: one small
//! `thiserror` enum per concern rather than one crate-wide error.

use thiserror::Error;

/// A request body failed its length/range bounds checks (input size,
/// iteration count). Always surfaced as HTTP 422, never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("input_data must be 1..10000 bytes, got {0}")]
    InputDataLength(usize),
    #[error("iterations must be 1..1000000, got {0}")]
    Iterations(u32),
    #[error("callback_url must be 1..2048 bytes, got {0}")]
    CallbackUrlLength(usize),
    #[error("callback_url is required for async requests")]
    MissingCallbackUrl,
    #[error("mode must be \"sync\" or \"async\", got {0:?}")]
    InvalidMode(String),
    #[error("limit must be 1..200, got {0}")]
    Limit(i64),
    #[error("offset must be >= 0, got {0}")]
    Offset(i64),
}

/// A callback URL was rejected by the SSRF validator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SsrfError {
    #[error("invalid scheme: {0}. Only http/https allowed.")]
    InvalidScheme(String),
    #[error("no hostname in callback URL")]
    MissingHostname,
    #[error("DNS resolution failed for {host}: {reason}")]
    ResolutionFailed { host: String, reason: String },
    #[error("callback URL resolves to disallowed address {0}")]
    DisallowedAddress(String),
}

/// A store operation failed. Store read failures surface as 500 to HTTP
/// callers; store write failures during task processing are logged and the
/// pipeline continues rather than aborting the job.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("request {0} already exists")]
    DuplicateId(String),
}
