//! Callback delivery: the retrying, SSRF-re-checked POST of a job's outcome
//! to its caller-supplied URL.
//!
//! Ported from `original_source/src/app/callback.py`'s `deliver_callback`:
//! same retry count, same backoff shape, same re-validate-then-POST order
//! per attempt, same attempt log semantics. The HTTP client is built the
//! way `cyclotron_fetch::context::AppContext::create` builds its client —
//! a single long-lived `reqwest::Client` carrying the timeout — except
//! redirects are disabled outright rather than routed through a
//! public-IP-only resolver, since every attempt already re-runs
//! [`SsrfValidator::validate`] before the request goes out.

use std::time::{Duration, Instant};

use rand::thread_rng;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::models::CallbackStatus;
use crate::retry::BackoffPolicy;
use crate::ssrf::SsrfValidator;
use crate::store::Store;

pub struct CallbackDeliverer {
    client: reqwest::Client,
    validator: SsrfValidator,
    store: Store,
    max_retries: u32,
    backoff: BackoffPolicy,
}

impl CallbackDeliverer {
    pub fn new(
        store: Store,
        validator: SsrfValidator,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            validator,
            store,
            max_retries,
            backoff: BackoffPolicy::default(),
        })
    }

    /// Run the full retry loop for one request's callback, persisting every
    /// attempt and the final status along the way. Never returns an error:
    /// delivery failure is a terminal, logged outcome, not a propagated one.
    pub async fn deliver<P: Serialize>(&self, request_id: &str, callback_url: &str, payload: &P) {
        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(e) => {
                error!(request_id, error = %e, "failed to serialize callback payload");
                return;
            }
        };

        for attempt in 1..=self.max_retries {
            let start = Instant::now();

            if let Err(ssrf_err) = self.validator.validate(callback_url).await {
                let error_msg = format!("SSRF blocked: {ssrf_err}");
                let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
                self.log_attempt(request_id, attempt, None, Some(&error_msg), elapsed_ms).await;
                self.finish(request_id, CallbackStatus::Failed, attempt, Some(&error_msg)).await;
                warn!(request_id, error = %ssrf_err, "SSRF blocked at delivery time");
                return; // permanent failure, no retry
            }

            let outcome = self
                .client
                .post(callback_url)
                .header("X-Request-ID", request_id)
                .header("X-Attempt-Number", attempt.to_string())
                .header("Content-Type", "application/json")
                .body(body.clone())
                .send()
                .await;

            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

            let (status_code, error_msg) = match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        self.log_attempt(request_id, attempt, Some(status.as_u16()), None, elapsed_ms)
                            .await;
                        self.finish(request_id, CallbackStatus::Delivered, attempt, None).await;
                        info!(request_id, attempt, elapsed_ms, "callback delivered");
                        return;
                    }
                    (Some(status.as_u16()), format!("HTTP {}", status.as_u16()))
                }
                Err(e) if e.is_timeout() => (None, "Timeout".to_owned()),
                Err(e) => (None, format!("Connection error: {e}")),
            };

            self.log_attempt(request_id, attempt, status_code, Some(&error_msg), elapsed_ms)
                .await;
            warn!(
                request_id,
                attempt,
                max_retries = self.max_retries,
                error = %error_msg,
                "callback attempt failed"
            );

            if attempt < self.max_retries {
                let delay = self.backoff.delay_for(attempt, &mut thread_rng());
                tokio::time::sleep(delay).await;
            }
        }

        let error_msg = format!("All {} attempts failed", self.max_retries);
        self.finish(request_id, CallbackStatus::Failed, self.max_retries, Some(&error_msg)).await;
        error!(request_id, max_retries = self.max_retries, "callback delivery exhausted retries");
    }

    async fn log_attempt(
        &self,
        request_id: &str,
        attempt: u32,
        status_code: Option<u16>,
        error: Option<&str>,
        duration_ms: f64,
    ) {
        if let Err(e) = self
            .store
            .insert_callback_attempt(request_id, attempt, status_code, error, duration_ms)
            .await
        {
            warn!(request_id, attempt, error = %e, "failed to persist callback attempt");
        }
    }

    async fn finish(
        &self,
        request_id: &str,
        status: CallbackStatus,
        attempts: u32,
        error: Option<&str>,
    ) {
        if let Err(e) = self.store.update_callback_status(request_id, status, attempts, error).await {
            warn!(request_id, error = %e, "failed to persist final callback status");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompletionPayload, RequestMode};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn deliverer(store: Store) -> CallbackDeliverer {
        CallbackDeliverer::new(
            store,
            SsrfValidator::new(true),
            Duration::from_secs(2),
            3,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn delivers_successfully_on_first_attempt() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        store
            .insert_request("req-1", RequestMode::Async, "x", 1, Some("http://placeholder"))
            .await
            .unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cb"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let deliverer = deliverer(store.clone()).await;
        let payload = CompletionPayload {
            request_id: "req-1".to_owned(),
            status: "completed",
            result: "deadbeef".to_owned(),
            iterations: 1,
            duration_ms: 1.0,
        };
        let url = format!("{}/cb", server.uri());
        deliverer.deliver("req-1", &url, &payload).await;

        let record = store.get_request("req-1").await.unwrap().unwrap();
        assert_eq!(record.callback_status, Some(CallbackStatus::Delivered));
        assert_eq!(record.callback_attempts, 1);
    }

    #[tokio::test]
    async fn marks_failed_after_exhausting_retries() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        store
            .insert_request("req-2", RequestMode::Async, "x", 1, Some("http://placeholder"))
            .await
            .unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cb"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut deliverer = deliverer(store.clone()).await;
        deliverer.backoff = BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(5));
        let payload = CompletionPayload {
            request_id: "req-2".to_owned(),
            status: "completed",
            result: "deadbeef".to_owned(),
            iterations: 1,
            duration_ms: 1.0,
        };
        let url = format!("{}/cb", server.uri());
        deliverer.deliver("req-2", &url, &payload).await;

        let record = store.get_request("req-2").await.unwrap().unwrap();
        assert_eq!(record.callback_status, Some(CallbackStatus::Failed));
        assert_eq!(record.callback_attempts, 3);

        let attempts = store.get_callback_attempts("req-2").await.unwrap();
        assert_eq!(attempts.len(), 3);
    }

    #[tokio::test]
    async fn ssrf_blocked_url_fails_without_http_call() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        store
            .insert_request("req-3", RequestMode::Async, "x", 1, Some("http://127.0.0.1/cb"))
            .await
            .unwrap();

        let deliverer = CallbackDeliverer::new(
            store.clone(),
            SsrfValidator::new(false),
            Duration::from_secs(2),
            3,
        )
        .unwrap();

        let payload = CompletionPayload {
            request_id: "req-3".to_owned(),
            status: "completed",
            result: "deadbeef".to_owned(),
            iterations: 1,
            duration_ms: 1.0,
        };
        deliverer.deliver("req-3", "http://127.0.0.1/cb", &payload).await;

        let record = store.get_request("req-3").await.unwrap().unwrap();
        assert_eq!(record.callback_status, Some(CallbackStatus::Failed));
        assert_eq!(record.callback_attempts, 1); // permanent fail, no retry
        assert!(store.get_callback_attempts("req-3").await.unwrap().len() == 1);
    }
}
