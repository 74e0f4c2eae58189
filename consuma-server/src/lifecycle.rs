//! Process lifecycle: startup order is
//! store → queue+workers → periodic maintenance → ready; shutdown runs the
//! reverse (cancel maintenance → queue drain/cancel → store close), every
//! step guaranteed to run even if an earlier one failed.
//!
//! `rust/common/lifecycle::Manager`'s full signal-trapping dedicated
//! runtime and K8s liveness/readiness probes are heavier machinery than
//! this single-process server needs (see DESIGN.md). What's kept is its
//! shutdown *shape*: a cancellation token plus a bounded drain before a
//! hard cancel, mirrored here by [`crate::rate_limit`]'s sweep task and
//! [`consuma_core::queue::TaskQueue::shutdown`].

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::rate_limit::RateLimiter;
use crate::state::AppState;

const RATE_LIMIT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const QUEUE_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Spawn the periodic rate-limiter sweep, run at 60 s intervals. The
/// returned handle is aborted, not awaited, during shutdown — it has no
/// in-flight state worth draining.
pub fn spawn_rate_limit_sweep(limiter: RateLimiter) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(RATE_LIMIT_SWEEP_INTERVAL);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            let removed = limiter.cleanup_stale();
            if removed > 0 {
                debug!(removed, "rate limiter cleanup: removed stale entries");
            }
        }
    })
}

/// Shutdown order: cancel maintenance, drain/cancel the queue, close the
/// store. Each step runs regardless of whether an earlier one panicked or
/// the queue drain timed out.
pub async fn shutdown(state: &AppState, maintenance: JoinHandle<()>) {
    info!("shutting down: cancelling maintenance task");
    maintenance.abort();

    info!("shutting down: draining task queue");
    state.queue.shutdown(QUEUE_DRAIN_TIMEOUT).await;

    info!("shutting down: closing store");
    state.store.close().await;

    info!("graceful shutdown complete");
}
