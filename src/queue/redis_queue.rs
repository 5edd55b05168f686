//! Redis-backed job queue: a sorted set scored by `(priority, queued_at)`
//! holds pending jobs; pop is a single Lua `EVAL` that reads the lowest
//! score, copies the member into an in-flight hash, and removes it from the
//! sorted set — one round trip, no read-then-delete race.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use tracing::instrument;
use uuid::Uuid;

use super::{Job, JobQueue, QueueError};

/// Returns the popped job's JSON payload, or `false` if the pending set is
/// empty. Uses Redis's built-in `cjson` to pull `messageId` out of the
/// payload so the in-flight hash can be keyed by it in the same round trip.
const POP_SCRIPT: &str = r#"
local popped = redis.call("ZRANGE", KEYS[1], 0, 0)
if #popped == 0 then
    return false
end
local payload = popped[1]
redis.call("ZREM", KEYS[1], payload)
local job = cjson.decode(payload)
redis.call("HSET", KEYS[2], job.messageId, payload)
return payload
"#;

#[derive(Clone)]
pub struct RedisJobQueue {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisJobQueue {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self { conn, prefix: prefix.into() }
    }

    fn pending_key(&self) -> String {
        format!("{}queue:pending", self.prefix)
    }

    fn in_flight_key(&self) -> String {
        format!("{}queue:in_flight", self.prefix)
    }

    /// A single `f64` that preserves `(priority, queued_at)` ordering:
    /// priority dominates the high digits, `queued_at` (epoch millis)
    /// breaks ties within a priority band.
    fn score(job: &Job) -> f64 {
        job.priority as f64 * 1e13 + job.queued_at.timestamp_millis() as f64
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    #[instrument(skip(self, job))]
    async fn publish(&self, job: Job) -> Result<Job, QueueError> {
        let payload = serde_json::to_string(&job).map_err(|e| QueueError::Backend(e.to_string()))?;
        let mut conn = self.conn.clone();
        conn.zadd::<_, _, _, ()>(self.pending_key(), payload, Self::score(&job))
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(job)
    }

    #[instrument(skip(self))]
    async fn pop(&self) -> Result<Option<Job>, QueueError> {
        let mut conn = self.conn.clone();
        let result: redis::Value = redis::Script::new(POP_SCRIPT)
            .key(self.pending_key())
            .key(self.in_flight_key())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        let payload: Option<String> = match result {
            redis::Value::Nil | redis::Value::Boolean(false) => None,
            other => redis::from_redis_value(&other).map_err(|e| QueueError::Backend(e.to_string()))?,
        };
        let Some(payload) = payload else { return Ok(None) };

        let job: Job = serde_json::from_str(&payload).map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(Some(job))
    }

    #[instrument(skip(self))]
    async fn ack(&self, message_id: Uuid) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        conn.hdel::<_, _, ()>(self.in_flight_key(), message_id.to_string())
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn nack(&self, message_id: Uuid, requeue: bool) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn
            .hget(self.in_flight_key(), message_id.to_string())
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        conn.hdel::<_, _, ()>(self.in_flight_key(), message_id.to_string())
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;

        if let (true, Some(payload)) = (requeue, payload) {
            let mut job: Job =
                serde_json::from_str(&payload).map_err(|e| QueueError::Backend(e.to_string()))?;
            job.attempt += 1;
            self.publish(job).await?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn pending_len(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        let len: u64 = conn
            .zcard(self.pending_key())
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(len)
    }
}
