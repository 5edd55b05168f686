//! In-process lock backend for unit/integration tests.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::sleep;
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{AcquireBackoff, LockError, LockHandle, LockManager};

struct Lease {
    owner_id: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct InMemoryLockManager {
    leases: Mutex<HashMap<String, Lease>>,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_acquire(&self, key: &str, ttl: Duration) -> Option<String> {
        let mut leases = self.leases.lock();
        let now = Instant::now();
        if let Some(existing) = leases.get(key) {
            if existing.expires_at > now {
                return None;
            }
        }
        let owner_id = Uuid::now_v7().to_string();
        leases.insert(
            key.to_string(),
            Lease { owner_id: owner_id.clone(), expires_at: now + ttl },
        );
        Some(owner_id)
    }
}

#[async_trait]
impl LockManager for InMemoryLockManager {
    #[instrument(skip(self))]
    async fn acquire(&self, key: &str, wait_timeout: Duration) -> Result<Option<LockHandle>, LockError> {
        let deadline = Instant::now() + wait_timeout;
        let mut backoff = AcquireBackoff::new();
        loop {
            if let Some(owner_id) = self.try_acquire(key, wait_timeout) {
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
        let mut leases = self.leases.lock();
        match leases.get(&handle.key) {
            Some(lease) if lease.owner_id == handle.owner_id => {
                leases.remove(&handle.key);
            }
            Some(_) => warn!(key = %handle.key, "release after lease expired or stolen"),
            None => warn!(key = %handle.key, "release of untracked lock key"),
        }
        Ok(())
    }

    async fn is_locked(&self, key: &str) -> Result<bool, LockError> {
        let leases = self.leases.lock();
        Ok(leases.get(key).map(|l| l.expires_at > Instant::now()).unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_waits_then_times_out() {
        let manager = InMemoryLockManager::new();
        let handle = manager.acquire("k", Duration::from_secs(5)).await.unwrap().unwrap();
        let second = manager.acquire("k", Duration::from_millis(120)).await.unwrap();
        assert!(second.is_none());
        manager.release(handle).await.unwrap();
        assert!(manager.acquire("k", Duration::from_secs(1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn release_checks_ownership() {
        let manager = InMemoryLockManager::new();
        let handle = manager.acquire("k", Duration::from_secs(5)).await.unwrap().unwrap();
        let forged = LockHandle { key: "k".into(), owner_id: "someone-else".into() };
        manager.release(forged).await.unwrap();
        assert!(manager.is_locked("k").await.unwrap());
        manager.release(handle).await.unwrap();
        assert!(!manager.is_locked("k").await.unwrap());
    }

    #[tokio::test]
    async fn is_locked_reflects_state() {
        let manager = InMemoryLockManager::new();
        assert!(!manager.is_locked("k").await.unwrap());
        manager.acquire("k", Duration::from_secs(5)).await.unwrap();
        assert!(manager.is_locked("k").await.unwrap());
    }
}
