//! Bounded-concurrency job consumer (§4.6): pop, dispatch by `job.type` to
//! the engine, release a semaphore permit in every path, ack on success and
//! nack-with-requeue on failure.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, instrument, warn};

use crate::engine::ExecutionEngine;
use crate::persistence::Persistence;
use crate::queue::{Job, JobQueue, JobType, MAX_QUEUE_ATTEMPTS, MIN_POLL_INTERVAL};

use super::heartbeat::HeartbeatSink;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub max_concurrency: usize,
    pub heartbeat_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: default_worker_id(),
            max_concurrency: 10,
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            worker_id: std::env::var("WORKER_ID").unwrap_or(default.worker_id),
            max_concurrency: std::env::var("WORKER_MAX_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_concurrency),
            heartbeat_interval: std::env::var("WORKER_HEARTBEAT_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.heartbeat_interval),
        }
    }
}

fn default_worker_id() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
    format!("{host}-{}", std::process::id())
}

pub struct WorkerPool<S: Persistence, Q: JobQueue> {
    engine: Arc<ExecutionEngine<S>>,
    queue: Arc<Q>,
    heartbeat: Arc<dyn HeartbeatSink>,
    config: WorkerConfig,
}

impl<S: Persistence + 'static, Q: JobQueue + 'static> WorkerPool<S, Q> {
    pub fn new(
        engine: Arc<ExecutionEngine<S>>,
        queue: Arc<Q>,
        heartbeat: Arc<dyn HeartbeatSink>,
        config: WorkerConfig,
    ) -> Self {
        Self { engine, queue, heartbeat, config }
    }

    pub fn worker_id(&self) -> &str {
        &self.config.worker_id
    }

    /// Runs the consume loop and the heartbeat loop concurrently until
    /// `cancellation` fires.
    #[instrument(skip(self, cancellation), fields(worker_id = %self.config.worker_id))]
    pub async fn run(&self, cancellation: CancellationToken) {
        tokio::join!(
            self.consume_loop(cancellation.clone()),
            self.heartbeat_loop(cancellation),
        );
    }

    async fn consume_loop(&self, cancellation: CancellationToken) {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));

        loop {
            if cancellation.is_cancelled() {
                return;
            }

            let popped = tokio::select! {
                biased;
                _ = cancellation.cancelled() => return,
                popped = self.queue.pop() => popped,
            };

            match popped {
                Ok(Some(job)) => {
                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return,
                    };
                    let engine = self.engine.clone();
                    let queue = self.queue.clone();
                    let job_cancellation = cancellation.clone();
                    tokio::spawn(async move {
                        let message_id = job.message_id;
                        let attempt = job.attempt;
                        let outcome = dispatch(&engine, &job, job_cancellation).await;
                        match outcome {
                            Ok(()) => {
                                if let Err(e) = queue.ack(message_id).await {
                                    error!(%message_id, %e, "ack failed");
                                }
                            }
                            Err(reason) => {
                                let requeue = attempt < MAX_QUEUE_ATTEMPTS;
                                warn!(%message_id, %reason, requeue, "job dispatch failed");
                                if let Err(e) = queue.nack(message_id, requeue).await {
                                    error!(%message_id, %e, "nack failed");
                                }
                            }
                        }
                        drop(permit);
                    });
                }
                Ok(None) => {
                    tokio::select! {
                        biased;
                        _ = cancellation.cancelled() => return,
                        _ = sleep(MIN_POLL_INTERVAL) => {}
                    }
                }
                Err(e) => {
                    error!(%e, "queue pop failed");
                    sleep(MIN_POLL_INTERVAL).await;
                }
            }
        }
    }

    async fn heartbeat_loop(&self, cancellation: CancellationToken) {
        let ttl = self.config.heartbeat_interval * 3;
        let mut ticker = tokio::time::interval(self.config.heartbeat_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.heartbeat.beat(&self.config.worker_id, ttl).await {
                        error!(%e, "heartbeat failed");
                    }
                }
                _ = cancellation.cancelled() => return,
            }
        }
    }
}

async fn dispatch<S: Persistence>(
    engine: &ExecutionEngine<S>,
    job: &Job,
    cancellation: CancellationToken,
) -> Result<(), String> {
    match job.job_type {
        JobType::Start | JobType::Continue | JobType::Resume | JobType::Retry => engine
            .execute(job.instance_id, cancellation)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string()),
        JobType::Cancel => engine
            .cancel(job.instance_id)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_contract() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrency, 10);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
    }
}
