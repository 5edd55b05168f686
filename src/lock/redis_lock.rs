//! Redis-backed lock manager: `SET key id PX ttl NX` to acquire, a single
//! atomic Lua `EVAL` to compare-and-delete on release. The ownership check
//! must be atomic to avoid a lost-lease race where a worker deletes a key
//! re-acquired by someone else after its own lease expired.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use tokio::time::sleep;
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{AcquireBackoff, LockError, LockHandle, LockManager};

const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

#[derive(Clone)]
pub struct RedisLockManager {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisLockManager {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self { conn, prefix: prefix.into() }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}lock:{key}", self.prefix)
    }
}

#[async_trait]
impl LockManager for RedisLockManager {
    #[instrument(skip(self))]
    async fn acquire(&self, key: &str, wait_timeout: Duration) -> Result<Option<LockHandle>, LockError> {
        let namespaced = self.namespaced(key);
        let owner_id = Uuid::now_v7().to_string();
        let deadline = Instant::now() + wait_timeout;
        let mut backoff = AcquireBackoff::new();
        let ttl_ms = wait_timeout.as_millis().max(1) as u64;

        let mut conn = self.conn.clone();
        loop {
            let acquired: Option<String> = redis::cmd("SET")
                .arg(&namespaced)
                .arg(&owner_id)
                .arg("PX")
                .arg(ttl_ms)
                .arg("NX")
                .query_async(&mut conn)
                .await
                .map_err(|e| LockError::Backend(e.to_string()))?;

            if acquired.is_some() {
                return Ok(Some(LockHandle { key: key.to_string(), owner_id }));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            sleep(backoff.next()).await;
        }
    }

    #[instrument(skip(self, handle))]
    async fn release(&self, handle: LockHandle) -> Result<(), LockError> {
        let namespaced = self.namespaced(&handle.key);
        let mut conn = self.conn.clone();
        let deleted: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(&namespaced)
            .arg(&handle.owner_id)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;
        if deleted == 0 {
            warn!(key = %handle.key, "release after lease expired or stolen");
        }
        Ok(())
    }

    async fn is_locked(&self, key: &str) -> Result<bool, LockError> {
        let namespaced = self.namespaced(key);
        let mut conn = self.conn.clone();
        let exists: bool = conn
            .exists(&namespaced)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;
        Ok(exists)
    }
}
