//! # FlowForge Engine
//!
//! A distributed workflow orchestration engine: durable, data-defined
//! activity graphs advanced by workers pulling jobs off a shared queue,
//! coordinated through per-instance locks.
//!
//! ## Features
//!
//! - **Data-defined workflows**: activity graphs and transitions are rows
//!   loaded from the Persistence Port, not compiled Rust types — one
//!   `ExecutionEngine` drives every workflow.
//! - **Automatic retries**: per-activity or per-definition retry policies
//!   with exponential backoff.
//! - **Durable job queue**: Redis-backed priority queue with in-flight
//!   tracking, ack, and nack-with-requeue.
//! - **Distributed locking**: per-instance mutual exclusion across workers,
//!   with ownership-checked release.
//! - **Cron scheduling**: six-field cron expressions drive recurring
//!   workflow starts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CronScheduler                            │
//! │  (ticks; enqueues Start jobs for due scheduled definitions)  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         JobQueue                              │
//! │  (Redis sorted set: priority + FIFO, in-flight tracking)     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        WorkerPool                             │
//! │  (bounded concurrency; dispatches jobs to the engine)        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ExecutionEngine                           │
//! │  (advances one instance under its lock; activity I/O,       │
//! │   retry, timeout, transition, and suspend/resume)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod activity;
pub mod admin;
pub mod config;
pub mod engine;
pub mod error;
pub mod expression;
pub mod lock;
pub mod model;
pub mod persistence;
pub mod queue;
pub mod reliability;
pub mod scheduler;
pub mod worker;

mod duration_millis;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::activity::{ActivityContext, ActivityError, ActivityHandler, ActivityRegistry, ActivityResult};
    pub use crate::admin::AppState as AdminState;
    pub use crate::engine::{EngineConfig, ExecutionEngine, ExecutorError};
    pub use crate::error::EngineError;
    pub use crate::lock::{LockError, LockManager};
    pub use crate::model::{ActivityExecution, WorkflowDefinition, WorkflowInstance};
    pub use crate::persistence::{Persistence, StoreError};
    pub use crate::queue::{Job, JobQueue, JobType};
    pub use crate::reliability::RetryPolicy;
    pub use crate::scheduler::{CronScheduler, InstanceStarter};
    pub use crate::worker::{WorkerConfig, WorkerPool};
}

pub use engine::{EngineConfig, ExecutionEngine, ExecutorError};
pub use error::EngineError;
pub use persistence::{Persistence, StoreError};
pub use reliability::RetryPolicy;
