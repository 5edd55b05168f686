//! Worker Pool (§4.6): subscribes to the Job Queue with bounded concurrency,
//! dispatches each job to the Execution Engine, and posts a liveness
//! heartbeat on its own schedule.

mod heartbeat;
mod pool;

pub use heartbeat::{HeartbeatError, HeartbeatSink, InMemoryHeartbeatSink, RedisHeartbeatSink};
pub use pool::{WorkerConfig, WorkerPool};
