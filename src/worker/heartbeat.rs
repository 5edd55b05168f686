//! Worker liveness records: `SET <prefix>worker:<id> <timestamp> PX ttl`,
//! refreshed every `heartbeat_interval` with a TTL of `3 * heartbeat_interval`
//! so a crashed worker's record expires on its own rather than needing an
//! explicit deregistration step.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HeartbeatError {
    #[error("heartbeat backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait HeartbeatSink: Send + Sync {
    async fn beat(&self, worker_id: &str, ttl: Duration) -> Result<(), HeartbeatError>;
    async fn is_alive(&self, worker_id: &str) -> Result<bool, HeartbeatError>;
}

pub struct RedisHeartbeatSink {
    conn: redis::aio::ConnectionManager,
    prefix: String,
}

impl RedisHeartbeatSink {
    pub fn new(conn: redis::aio::ConnectionManager, prefix: impl Into<String>) -> Self {
        Self { conn, prefix: prefix.into() }
    }

    fn key(&self, worker_id: &str) -> String {
        format!("{}worker:{worker_id}", self.prefix)
    }
}

#[async_trait]
impl HeartbeatSink for RedisHeartbeatSink {
    #[instrument(skip(self))]
    async fn beat(&self, worker_id: &str, ttl: Duration) -> Result<(), HeartbeatError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(self.key(worker_id))
            .arg(Utc::now().to_rfc3339())
            .arg("PX")
            .arg(ttl.as_millis().max(1) as u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| HeartbeatError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn is_alive(&self, worker_id: &str) -> Result<bool, HeartbeatError> {
        use redis::AsyncCommands;
        let mut conn = self.conn.clone();
        let exists: bool = conn
            .exists(self.key(worker_id))
            .await
            .map_err(|e| HeartbeatError::Backend(e.to_string()))?;
        Ok(exists)
    }
}

/// In-process sink for tests: records the last beat time per worker with no
/// TTL enforcement (liveness is always `true` once beaten).
#[derive(Default)]
pub struct InMemoryHeartbeatSink {
    beats: parking_lot::Mutex<std::collections::HashMap<String, chrono::DateTime<Utc>>>,
}

impl InMemoryHeartbeatSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HeartbeatSink for InMemoryHeartbeatSink {
    async fn beat(&self, worker_id: &str, _ttl: Duration) -> Result<(), HeartbeatError> {
        self.beats.lock().insert(worker_id.to_string(), Utc::now());
        Ok(())
    }

    async fn is_alive(&self, worker_id: &str) -> Result<bool, HeartbeatError> {
        Ok(self.beats.lock().contains_key(worker_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_sink_reports_liveness_after_beat() {
        let sink = InMemoryHeartbeatSink::new();
        assert!(!sink.is_alive("w1").await.unwrap());
        sink.beat("w1", Duration::from_secs(30)).await.unwrap();
        assert!(sink.is_alive("w1").await.unwrap());
    }
}
