//! Sliding-window rate limiter, one bucket of timestamps per client IP.
//!
//! Ported from `original_source/src/app/rate_limit.py`'s
//! `SlidingWindowRateLimiter` Starlette middleware: an in-memory map of
//! monotonic request timestamps per key, trimmed to the window on every
//! request. `/healthz` is exempt, same as the original. The periodic sweep
//! (run every 60 s) is
//! [`cleanup_stale`], driven by a background task the lifecycle supervisor
//! spawns and cancels on shutdown.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

#[derive(Serialize)]
struct RateLimitBody {
    detail: &'static str,
}

/// Shared limiter state, cheap to clone (an `Arc` around a mutex-guarded map).
#[derive(Clone)]
pub struct RateLimiter {
    inner: std::sync::Arc<Mutex<HashMap<String, Vec<Instant>>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            inner: std::sync::Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    /// Record one request for `key`, sliding the window. Returns `Ok(())` if
    /// under the limit, or `Err(retry_after)` with the number of whole
    /// seconds the caller should wait.
    fn check(&self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        let cutoff = now.checked_sub(self.window).unwrap_or(now);

        let mut requests = self.inner.lock().expect("rate limiter mutex poisoned");
        let timestamps = requests.entry(key.to_owned()).or_default();
        timestamps.retain(|t| *t > cutoff);

        if timestamps.len() >= self.max_requests as usize {
            let oldest = timestamps[0];
            let retry_after = self.window.saturating_sub(now.duration_since(oldest)).as_secs() + 1;
            return Err(retry_after.max(1));
        }

        timestamps.push(now);
        Ok(())
    }

    /// Drop entries for keys with no requests still inside the window.
    /// Returns the number of keys removed. Called every 60 s by the
    /// maintenance task started in [`crate::lifecycle`].
    pub fn cleanup_stale(&self) -> usize {
        let now = Instant::now();
        let cutoff = now.checked_sub(self.window).unwrap_or(now);

        let mut requests = self.inner.lock().expect("rate limiter mutex poisoned");
        let before = requests.len();
        requests.retain(|_, timestamps| timestamps.iter().any(|t| *t > cutoff));
        before - requests.len()
    }
}

/// Axum middleware entry point: exempts `/healthz`, keys everything else by
/// peer IP, and returns 429 + `Retry-After` once the window's budget is
/// spent.
pub async fn enforce(
    State(limiter): State<RateLimiter>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if request.uri().path() == "/healthz" {
        return next.run(request).await;
    }

    let key = addr.ip().to_string();
    match limiter.check(&key) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(RateLimitBody {
                    detail: "Rate limit exceeded",
                }),
            )
                .into_response();
            response.headers_mut().insert(
                "Retry-After",
                HeaderValue::from_str(&retry_after.to_string()).expect("digits are valid header value"),
            );
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_requests_under_the_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.check("1.2.3.4").is_ok());
        assert!(limiter.check("1.2.3.4").is_ok());
        assert!(limiter.check("1.2.3.4").is_ok());
    }

    #[test]
    fn rejects_once_limit_is_exceeded() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("1.2.3.4").is_ok());
        assert!(limiter.check("1.2.3.4").is_ok());
        assert!(limiter.check("1.2.3.4").is_err());
    }

    #[test]
    fn tracks_keys_independently() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("1.2.3.4").is_ok());
        assert!(limiter.check("5.6.7.8").is_ok());
        assert!(limiter.check("1.2.3.4").is_err());
    }

    #[test]
    fn cleanup_stale_drops_expired_keys_only() {
        let limiter = RateLimiter::new(5, Duration::from_millis(20));
        limiter.check("stale").unwrap();
        std::thread::sleep(Duration::from_millis(30));
        limiter.check("fresh").unwrap();

        let removed = limiter.cleanup_stale();
        assert_eq!(removed, 1);
        assert_eq!(limiter.inner.lock().unwrap().len(), 1);
    }
}
