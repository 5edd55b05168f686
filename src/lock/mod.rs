//! The Distributed Lock Manager: per-key advisory leases with
//! ownership-checked release.
//!
//! - [`LockManager`] — the trait the execution engine acquires the
//!   per-instance lock through.
//! - [`RedisLockManager`] — production backend (`SET key id PX ttl NX`
//!   to acquire, an atomic Lua compare-and-delete to release).
//! - [`InMemoryLockManager`] — test backend with no Redis dependency.

mod memory;
mod redis_lock;

pub use memory::InMemoryLockManager;
pub use redis_lock::RedisLockManager;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LockError {
    #[error("lock unavailable: {0}")]
    Unavailable(String),
    #[error("lock backend error: {0}")]
    Backend(String),
}

/// Held lease returned by a successful [`LockManager::acquire`]. Dropping it
/// without calling [`LockHandle::release`] leaves the lease to expire on its
/// own TTL; callers should always release explicitly on the happy path.
pub struct LockHandle {
    pub key: String,
    pub owner_id: String,
}

/// Per-key advisory lock with lease expiry. Acquisition retries a bounded
/// backoff (start 50ms, x1.5 per iteration, cap 500ms) until `wait_timeout`
/// elapses.
#[async_trait]
pub trait LockManager: Send + Sync {
    async fn acquire(&self, key: &str, wait_timeout: Duration) -> Result<Option<LockHandle>, LockError>;

    /// Deletes the key only if its current value equals `handle.owner_id`
    /// (atomic check-then-delete). A release after lease expiry is a no-op,
    /// not an error.
    async fn release(&self, handle: LockHandle) -> Result<(), LockError>;

    async fn is_locked(&self, key: &str) -> Result<bool, LockError>;
}

/// Bounded exponential backoff schedule for lock acquisition retries.
pub(crate) struct AcquireBackoff {
    current: Duration,
}

impl AcquireBackoff {
    const START: Duration = Duration::from_millis(50);
    const CAP: Duration = Duration::from_millis(500);

    pub fn new() -> Self {
        Self { current: Self::START }
    }

    pub fn next(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current.mul_f64(1.5)).min(Self::CAP);
        delay
    }
}

pub fn instance_lock_key(instance_id: uuid::Uuid) -> String {
    format!("instance:{instance_id}")
}
