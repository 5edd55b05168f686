//! Environment-driven configuration surface (§6's enumerated config keys).
//!
//! Every key maps to a field on one of [`engine::EngineConfig`],
//! [`worker::WorkerConfig`], [`scheduler::SchedulerConfig`], [`LockConfig`],
//! or [`QueueConfig`]. Each has a `Default` impl matching the documented
//! default and an `from_env()` constructor reading the corresponding
//! environment variable when present.

use crate::engine::EngineConfig;
use crate::scheduler::SchedulerConfig;
use crate::worker::WorkerConfig;

/// `postgres_connection`: the Persistence Port's connection string.
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub postgres_connection: String,
}

impl PersistenceConfig {
    pub fn from_env() -> Self {
        Self {
            postgres_connection: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/flowforge".to_string()),
        }
    }
}

/// `redis_connection` for the Distributed Lock Manager's backend, plus the
/// namespace prefix its keys are written under.
#[derive(Debug, Clone)]
pub struct LockConfig {
    pub redis_connection: String,
    pub key_prefix: String,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self { redis_connection: "redis://localhost".to_string(), key_prefix: "flowforge:".to_string() }
    }
}

impl LockConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            redis_connection: std::env::var("REDIS_URL").unwrap_or(default.redis_connection),
            key_prefix: std::env::var("LOCK_KEY_PREFIX").unwrap_or(default.key_prefix),
        }
    }
}

/// `redis_connection` for the Job Queue's backend, plus its namespace prefix.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub redis_connection: String,
    pub key_prefix: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { redis_connection: "redis://localhost".to_string(), key_prefix: "flowforge:".to_string() }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            redis_connection: std::env::var("REDIS_URL").unwrap_or(default.redis_connection),
            key_prefix: std::env::var("QUEUE_KEY_PREFIX").unwrap_or(default.key_prefix),
        }
    }
}

/// The full set of environment-sourced configuration for one engine process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub persistence: PersistenceConfig,
    pub lock: LockConfig,
    pub queue: QueueConfig,
    pub engine: EngineConfig,
    pub worker: WorkerConfig,
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            persistence: PersistenceConfig::from_env(),
            lock: LockConfig::from_env(),
            queue: QueueConfig::from_env(),
            engine: EngineConfig::from_env(),
            worker: WorkerConfig::from_env(),
            scheduler: SchedulerConfig::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_and_queue_defaults_share_the_local_redis_url() {
        assert_eq!(LockConfig::default().redis_connection, "redis://localhost");
        assert_eq!(QueueConfig::default().redis_connection, "redis://localhost");
    }
}
