//! The bounded in-memory task queue and its worker pool.
//!
//! Shaped like `hook_worker::worker::WebhookWorker`: a pool of
//! long-running tasks pulling from a shared source and calling out to a
//! `reqwest::Client`-backed deliverer per job. Unlike `WebhookWorker`
//! (which dequeues from a Postgres-backed `PgQueue` on a poll interval),
//! this queue is a bounded `tokio::sync::mpsc::channel` in memory — there
//! is no durable job queue, only a durable record store, so accepted work
//! that is still queued when the process dies is simply lost, same as
//! `original_source/src/app/task_queue.py`'s in-process `asyncio.Queue`.
//!
//! Shutdown follows `rust/common/lifecycle`'s `Handle`/`CancellationToken`
//! shape for signalling intake to stop, but draining is a plain closed
//! channel: `shutdown` cancels the token (so `enqueue` starts rejecting
//! immediately) and drops the queue's sender, which lets every worker's
//! `recv()` keep returning already-buffered tasks until the channel is
//! empty, at which point it returns `None` and the worker exits. Only a
//! drain that doesn't finish inside the timeout gets its worker aborted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::callback::CallbackDeliverer;
use crate::models::{CompletionPayload, ErrorPayload, RequestStatus};
use crate::store::Store;
use crate::work;

/// One unit of async work accepted by the `/async` endpoint.
#[derive(Debug, Clone)]
pub struct Task {
    pub request_id: String,
    pub input_data: String,
    pub iterations: u32,
    pub callback_url: String,
}

/// Returned by [`TaskQueue::enqueue`] when the bounded channel is full, so
/// the caller can surface the HTTP 503 backpressure response.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("task queue is full")]
pub struct QueueFullError;

pub struct TaskQueue {
    /// `None` once `shutdown` has dropped it; after that every send attempt
    /// (and `queue_depth`'s capacity probe) has nothing to read from.
    sender: std::sync::Mutex<Option<mpsc::Sender<Task>>>,
    shutdown_token: CancellationToken,
    active_workers: Arc<AtomicUsize>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl TaskQueue {
    /// Spawn `num_workers` long-running tasks consuming from a channel of
    /// capacity `max_queue_size`, each processing jobs through the A/B/C
    /// compute/persist/deliver steps below.
    pub fn start(
        max_queue_size: usize,
        num_workers: usize,
        store: Store,
        deliverer: Arc<CallbackDeliverer>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(max_queue_size);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let shutdown_token = CancellationToken::new();
        let active_workers = Arc::new(AtomicUsize::new(0));

        let workers = (0..num_workers)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    receiver.clone(),
                    store.clone(),
                    deliverer.clone(),
                    active_workers.clone(),
                ))
            })
            .collect();

        Self {
            sender: std::sync::Mutex::new(Some(sender)),
            shutdown_token,
            active_workers,
            workers: tokio::sync::Mutex::new(workers),
        }
    }

    /// Queue a task for the worker pool to pick up. Never blocks: a full
    /// queue is rejected immediately rather than applying backpressure to
    /// the HTTP caller's connection. Also rejected once shutdown has been
    /// signalled, even if the channel still has room.
    pub fn enqueue(&self, task: Task) -> Result<(), QueueFullError> {
        if self.shutdown_token.is_cancelled() {
            return Err(QueueFullError);
        }
        let sender = self.sender.lock().expect("sender mutex poisoned");
        match sender.as_ref() {
            Some(sender) => sender.try_send(task).map_err(|_| QueueFullError),
            None => Err(QueueFullError),
        }
    }

    pub fn active_worker_count(&self) -> usize {
        self.active_workers.load(Ordering::Relaxed)
    }

    /// Pending tasks not yet picked up by a worker: the gap between the
    /// channel's configured capacity and its currently available permits.
    /// Zero once the sender has been dropped at shutdown.
    pub fn queue_depth(&self) -> usize {
        let sender = self.sender.lock().expect("sender mutex poisoned");
        match sender.as_ref() {
            Some(sender) => sender.max_capacity() - sender.capacity(),
            None => 0,
        }
    }

    /// Signal intake to stop, then let workers drain whatever is still
    /// buffered in the channel before joining them, bounded by `timeout`.
    /// Workers still running when the timeout elapses are aborted rather
    /// than corrupting the store with a half-finished retry loop.
    /// Takes `&self` so the queue can live behind an `Arc` in shared
    /// handler state and still be shut down from the lifecycle task.
    pub async fn shutdown(&self, timeout: Duration) {
        self.shutdown_token.cancel();
        // Drop the sender so every worker's `recv()` keeps returning
        // already-queued tasks and only yields `None` once the channel is
        // fully drained — dropping it is what unblocks `recv()` for workers
        // that are currently idle-waiting, same as closing the channel.
        self.sender.lock().expect("sender mutex poisoned").take();

        let workers = std::mem::take(&mut *self.workers.lock().await);
        let abort_handles: Vec<_> = workers.iter().map(JoinHandle::abort_handle).collect();

        match tokio::time::timeout(timeout, join_all(workers)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        warn!(error = %e, "worker task panicked during shutdown");
                    }
                }
            }
            Err(_) => {
                warn!(?timeout, "queue drain timed out; aborting outstanding workers");
                for handle in abort_handles {
                    handle.abort();
                }
            }
        }
    }
}

type Receiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Task>>>;

/// Pulls tasks until the channel is closed and drained (`recv()` returns
/// `None`), processing each to completion before asking for the next. There
/// is no separate shutdown check: draining queued work and exiting once
/// empty both fall out of the channel closing in
/// [`TaskQueue::shutdown`].
async fn worker_loop(
    worker_id: usize,
    receiver: Receiver,
    store: Store,
    deliverer: Arc<CallbackDeliverer>,
    active_workers: Arc<AtomicUsize>,
) {
    info!(worker_id, "worker started");

    loop {
        let task = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };

        let Some(task) = task else {
            break;
        };

        active_workers.fetch_add(1, Ordering::Relaxed);
        process_task(&store, &deliverer, task).await;
        active_workers.fetch_sub(1, Ordering::Relaxed);
    }

    info!(worker_id, "worker stopped");
}

/// Strictly in order: compute the work function off the async executor,
/// persist the result (continuing even if the store write fails), then
/// deliver the callback.
async fn process_task(store: &Store, deliverer: &CallbackDeliverer, task: Task) {
    let input = task.input_data.clone();
    let iterations = task.iterations;
    let output = match tokio::task::spawn_blocking(move || work::run(input.as_bytes(), iterations))
        .await
    {
        Ok(output) => output,
        Err(join_err) => {
            warn!(request_id = %task.request_id, error = %join_err, "work function panicked");
            let payload = ErrorPayload {
                request_id: task.request_id.clone(),
                status: "failed",
                error: "Work computation failed".to_owned(),
            };
            if let Err(e) = store
                .update_request_result(&task.request_id, RequestStatus::Failed, "", 0.0)
                .await
            {
                warn!(request_id = %task.request_id, error = %e, "failed to persist failure status");
            }
            deliverer.deliver(&task.request_id, &task.callback_url, &payload).await;
            return;
        }
    };

    if let Err(e) = store
        .update_request_result(
            &task.request_id,
            RequestStatus::Completed,
            &output.result,
            output.duration_ms,
        )
        .await
    {
        warn!(request_id = %task.request_id, error = %e, "failed to persist completed result");
    }

    let payload = CompletionPayload {
        request_id: task.request_id.clone(),
        status: "completed",
        result: output.result,
        iterations: task.iterations,
        duration_ms: output.duration_ms,
    };
    deliverer.deliver(&task.request_id, &task.callback_url, &payload).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestMode;
    use crate::ssrf::SsrfValidator;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn processes_one_task_end_to_end() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        store
            .insert_request("req-1", RequestMode::Async, "hello", 10, Some("http://placeholder"))
            .await
            .unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cb"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let deliverer = Arc::new(
            CallbackDeliverer::new(store.clone(), SsrfValidator::new(true), Duration::from_secs(2), 3)
                .unwrap(),
        );
        let queue = TaskQueue::start(10, 2, store.clone(), deliverer);

        queue
            .enqueue(Task {
                request_id: "req-1".to_owned(),
                input_data: "hello".to_owned(),
                iterations: 10,
                callback_url: format!("{}/cb", server.uri()),
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        queue.shutdown(Duration::from_secs(5)).await;

        let record = store.get_request("req-1").await.unwrap().unwrap();
        assert_eq!(record.status, RequestStatus::Completed);
        assert_eq!(record.callback_status, Some(crate::models::CallbackStatus::Delivered));
    }

    #[tokio::test]
    async fn rejects_when_queue_is_full() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let deliverer = Arc::new(
            CallbackDeliverer::new(store.clone(), SsrfValidator::new(true), Duration::from_secs(2), 1)
                .unwrap(),
        );
        // Zero workers: nothing drains the channel, so the single slot fills immediately.
        let queue = TaskQueue::start(1, 0, store.clone(), deliverer);

        queue
            .enqueue(Task {
                request_id: "a".to_owned(),
                input_data: "x".to_owned(),
                iterations: 1,
                callback_url: "http://example.com".to_owned(),
            })
            .unwrap();

        let result = queue.enqueue(Task {
            request_id: "b".to_owned(),
            input_data: "x".to_owned(),
            iterations: 1,
            callback_url: "http://example.com".to_owned(),
        });
        assert!(result.is_err());

        queue.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn queue_depth_reflects_pending_tasks() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let deliverer = Arc::new(
            CallbackDeliverer::new(store.clone(), SsrfValidator::new(true), Duration::from_secs(2), 1)
                .unwrap(),
        );
        let queue = TaskQueue::start(4, 0, store.clone(), deliverer);
        assert_eq!(queue.queue_depth(), 0);

        queue
            .enqueue(Task {
                request_id: "a".to_owned(),
                input_data: "x".to_owned(),
                iterations: 1,
                callback_url: "http://example.com".to_owned(),
            })
            .unwrap();
        assert_eq!(queue.queue_depth(), 1);

        queue.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn shutdown_drains_buffered_tasks_instead_of_dropping_them() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        store
            .insert_request("req-a", RequestMode::Async, "a", 1, Some("http://placeholder"))
            .await
            .unwrap();
        store
            .insert_request("req-b", RequestMode::Async, "b", 1, Some("http://placeholder"))
            .await
            .unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cb"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
            .mount(&server)
            .await;

        let deliverer = Arc::new(
            CallbackDeliverer::new(store.clone(), SsrfValidator::new(true), Duration::from_secs(2), 1)
                .unwrap(),
        );
        // One worker, so req-b is still sitting in the channel buffer when
        // shutdown is called while the worker is busy delivering req-a.
        let queue = TaskQueue::start(4, 1, store.clone(), deliverer);
        let callback_url = format!("{}/cb", server.uri());

        queue
            .enqueue(Task {
                request_id: "req-a".to_owned(),
                input_data: "a".to_owned(),
                iterations: 1,
                callback_url: callback_url.clone(),
            })
            .unwrap();
        queue
            .enqueue(Task {
                request_id: "req-b".to_owned(),
                input_data: "b".to_owned(),
                iterations: 1,
                callback_url,
            })
            .unwrap();

        // Let the single worker pick up req-a; req-b stays buffered.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.queue_depth(), 1);

        queue.shutdown(Duration::from_secs(5)).await;

        let a = store.get_request("req-a").await.unwrap().unwrap();
        let b = store.get_request("req-b").await.unwrap().unwrap();
        assert_eq!(a.status, RequestStatus::Completed, "in-flight task must finish");
        assert_eq!(b.status, RequestStatus::Completed, "buffered task must be drained, not dropped");
    }

    #[tokio::test]
    async fn enqueue_rejected_and_active_workers_zero_after_shutdown() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let deliverer = Arc::new(
            CallbackDeliverer::new(store.clone(), SsrfValidator::new(true), Duration::from_secs(2), 1)
                .unwrap(),
        );
        let queue = TaskQueue::start(4, 2, store.clone(), deliverer);

        queue.shutdown(Duration::from_secs(5)).await;

        assert_eq!(queue.active_worker_count(), 0);
        let result = queue.enqueue(Task {
            request_id: "a".to_owned(),
            input_data: "x".to_owned(),
            iterations: 1,
            callback_url: "http://example.com".to_owned(),
        });
        assert!(result.is_err());
    }
}
