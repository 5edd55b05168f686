//! The Job Queue: a durable priority queue with in-flight tracking, ack,
//! and nack-with-requeue.
//!
//! - [`JobQueue`] — publish/pop/ack/nack, plus a default [`subscribe`]
//!   consumer loop built on top of them.
//! - [`RedisJobQueue`] — production backend (sorted set scored by
//!   `(priority, queued_at)`, atomic pop via Lua).
//! - [`InMemoryJobQueue`] — `BinaryHeap`-backed test backend.

mod job;
mod memory;
mod redis_queue;

pub use job::{Job, JobType};
pub use memory::InMemoryJobQueue;
pub use redis_queue::RedisJobQueue;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use uuid::Uuid;

/// Beyond this many delivery attempts a nacked job is dropped rather than
/// requeued (implementers SHOULD route it to a dead-letter collection).
pub const MAX_QUEUE_ATTEMPTS: u32 = 5;

/// Consumer sleeps at least this long between polls when the queue is empty.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueueError {
    #[error("queue backend error: {0}")]
    Backend(String),
}

/// Durable priority queue of [`Job`]s.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Assigns `message_id`, stamps `queued_at`, and stores the job so pop
    /// returns jobs in increasing `(priority, queued_at)` order.
    async fn publish(&self, job: Job) -> Result<Job, QueueError>;

    /// Atomically moves the lowest-scoring pending entry into an in-flight
    /// set and returns it. Losing the race on removal is recoverable: the
    /// caller should treat `Ok(None)` the same as an empty queue.
    async fn pop(&self) -> Result<Option<Job>, QueueError>;

    async fn ack(&self, message_id: Uuid) -> Result<(), QueueError>;

    /// If `requeue`, increments `job.attempt` and republishes with the same
    /// priority; otherwise drops the in-flight entry.
    async fn nack(&self, message_id: Uuid, requeue: bool) -> Result<(), QueueError>;

    async fn pending_len(&self) -> Result<u64, QueueError>;
}

/// Long-running consumer loop: pop, move to in-flight, invoke `handler`, ack
/// on success, nack-with-requeue (until [`MAX_QUEUE_ATTEMPTS`]) on failure.
pub async fn subscribe<Q, H, Fut>(queue: &Q, cancellation: CancellationToken, mut handler: H)
where
    Q: JobQueue + ?Sized,
    H: FnMut(Job) -> Fut,
    Fut: Future<Output = Result<(), String>>,
{
    loop {
        if cancellation.is_cancelled() {
            return;
        }

        let popped = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return,
            popped = queue.pop() => popped,
        };

        match popped {
            Ok(Some(job)) => {
                let message_id = job.message_id;
                let attempt = job.attempt;
                match handler(job).await {
                    Ok(()) => {
                        if let Err(e) = queue.ack(message_id).await {
                            error!("ack failed for {message_id}: {e}");
                        }
                    }
                    Err(reason) => {
                        let requeue = attempt < MAX_QUEUE_ATTEMPTS;
                        warn!(%message_id, %reason, requeue, "job handler failed");
                        if let Err(e) = queue.nack(message_id, requeue).await {
                            error!("nack failed for {message_id}: {e}");
                        }
                    }
                }
            }
            Ok(None) => {
                tokio::select! {
                    biased;
                    _ = cancellation.cancelled() => return,
                    _ = sleep(MIN_POLL_INTERVAL) => {}
                }
            }
            Err(e) => {
                error!("queue pop failed: {e}");
                sleep(MIN_POLL_INTERVAL).await;
            }
        }
    }
}
