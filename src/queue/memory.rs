//! In-process job queue for unit/integration tests.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{Job, JobQueue, QueueError};

struct ScoredJob(Job);

impl PartialEq for ScoredJob {
    fn eq(&self, other: &Self) -> bool {
        self.0.sort_key() == other.0.sort_key()
    }
}
impl Eq for ScoredJob {}

impl PartialOrd for ScoredJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredJob {
    /// `BinaryHeap` is a max-heap; reverse so the lowest `(priority,
    /// queued_at)` pair surfaces first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.sort_key().cmp(&self.0.sort_key())
    }
}

#[derive(Default)]
pub struct InMemoryJobQueue {
    pending: Mutex<BinaryHeap<ScoredJob>>,
    in_flight: Mutex<HashMap<Uuid, Job>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn publish(&self, job: Job) -> Result<Job, QueueError> {
        self.pending.lock().push(ScoredJob(job.clone()));
        Ok(job)
    }

    async fn pop(&self) -> Result<Option<Job>, QueueError> {
        let mut pending = self.pending.lock();
        let Some(ScoredJob(job)) = pending.pop() else {
            return Ok(None);
        };
        drop(pending);
        self.in_flight.lock().insert(job.message_id, job.clone());
        Ok(Some(job))
    }

    async fn ack(&self, message_id: Uuid) -> Result<(), QueueError> {
        self.in_flight.lock().remove(&message_id);
        Ok(())
    }

    async fn nack(&self, message_id: Uuid, requeue: bool) -> Result<(), QueueError> {
        let job = self.in_flight.lock().remove(&message_id);
        if let (true, Some(mut job)) = (requeue, job) {
            job.attempt += 1;
            self.pending.lock().push(ScoredJob(job));
        }
        Ok(())
    }

    async fn pending_len(&self) -> Result<u64, QueueError> {
        Ok(self.pending.lock().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::JobType;

    #[tokio::test]
    async fn pop_respects_priority_then_fifo() {
        let queue = InMemoryJobQueue::new();
        let instance = Uuid::now_v7();
        let low = Job::new(instance, None, JobType::Start, 200);
        let high = Job::new(instance, None, JobType::Start, 50);
        queue.publish(low.clone()).await.unwrap();
        queue.publish(high.clone()).await.unwrap();

        let first = queue.pop().await.unwrap().unwrap();
        assert_eq!(first.message_id, high.message_id);
        let second = queue.pop().await.unwrap().unwrap();
        assert_eq!(second.message_id, low.message_id);
    }

    #[tokio::test]
    async fn nack_with_requeue_increments_attempt() {
        let queue = InMemoryJobQueue::new();
        let job = Job::new(Uuid::now_v7(), None, JobType::Retry, 100);
        queue.publish(job.clone()).await.unwrap();
        let popped = queue.pop().await.unwrap().unwrap();
        queue.nack(popped.message_id, true).await.unwrap();

        let requeued = queue.pop().await.unwrap().unwrap();
        assert_eq!(requeued.attempt, 1);
    }

    #[tokio::test]
    async fn nack_without_requeue_drops_the_job() {
        let queue = InMemoryJobQueue::new();
        let job = Job::new(Uuid::now_v7(), None, JobType::Start, 100);
        queue.publish(job).await.unwrap();
        let popped = queue.pop().await.unwrap().unwrap();
        queue.nack(popped.message_id, false).await.unwrap();
        assert_eq!(queue.pending_len().await.unwrap(), 0);
        assert!(queue.pop().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ack_removes_from_in_flight() {
        let queue = InMemoryJobQueue::new();
        let job = Job::new(Uuid::now_v7(), None, JobType::Start, 100);
        queue.publish(job).await.unwrap();
        let popped = queue.pop().await.unwrap().unwrap();
        queue.ack(popped.message_id).await.unwrap();
        assert!(queue.in_flight.lock().is_empty());
    }
}
