//! The Cron Scheduler: a process-wide loop that starts instances for due
//! scheduled definitions.
//!
//! Should itself be singletonized via a well-known lock key when multiple
//! replicas run (see [`crate::lock`]); that coordination is the caller's
//! responsibility, not this module's.

mod config;
mod table;

pub use config::SchedulerConfig;
pub use table::{Schedule, ScheduleTable};

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::model::JsonMap;
use crate::queue::{Job, JobQueue, JobType};

/// What the scheduler needs from the execution engine: a way to start a new
/// instance of a named definition. Kept as a narrow trait so the scheduler
/// doesn't depend on the engine's full surface.
#[async_trait]
pub trait InstanceStarter: Send + Sync {
    async fn start(&self, workflow_name: &str, input: JsonMap) -> Result<Uuid, String>;
}

/// Priority a scheduler-triggered `Start` job is published at.
pub const SCHEDULED_START_PRIORITY: i32 = 50;
/// Priority a `trigger_now`-forced start is published at.
pub const FORCED_START_PRIORITY: i32 = 10;

pub struct CronScheduler<S, Q> {
    starter: Arc<S>,
    queue: Arc<Q>,
    table: ScheduleTable,
    config: SchedulerConfig,
}

impl<S, Q> CronScheduler<S, Q>
where
    S: InstanceStarter,
    Q: JobQueue,
{
    pub fn new(starter: Arc<S>, queue: Arc<Q>, config: SchedulerConfig) -> Self {
        Self { starter, queue, table: ScheduleTable::new(), config }
    }

    /// Replaces the schedule table's contents. Called on start and whenever
    /// definitions change; invalid crons are logged and skipped rather than
    /// rejecting the whole refresh.
    pub fn refresh(&mut self, definitions: &[crate::model::WorkflowDefinition]) {
        self.table.refresh(definitions);
    }

    /// Runs the `check_interval` loop until `cancellation` fires.
    pub async fn run(&mut self, cancellation: CancellationToken) {
        if !self.config.enabled {
            info!("scheduler disabled, not starting the check loop");
            return;
        }
        loop {
            tokio::select! {
                biased;
                _ = cancellation.cancelled() => return,
                _ = tokio::time::sleep(self.config.check_interval) => {}
            }
            self.check_once().await;
        }
    }

    /// One pass over the schedule table: starts due schedules up to
    /// `max_starts_per_check`.
    pub async fn check_once(&mut self) {
        let due = self.table.due_names(self.config.max_starts_per_check);
        for name in due {
            if let Err(e) = self.fire(&name, SCHEDULED_START_PRIORITY).await {
                warn!(workflow = %name, error = %e, "scheduled start failed");
                continue;
            }
            self.table.mark_run(&name);
        }
    }

    /// Forces one start at [`FORCED_START_PRIORITY`] without updating
    /// `next_run`.
    pub async fn trigger_now(&self, name: &str) -> Result<(), String> {
        self.fire(name, FORCED_START_PRIORITY).await
    }

    async fn fire(&self, name: &str, priority: i32) -> Result<(), String> {
        let input = self.table.input_for(name).unwrap_or_default();
        let instance_id = self.starter.start(name, input).await?;
        let job = Job::new(instance_id, None, JobType::Start, priority);
        self.queue.publish(job).await.map_err(|e| e.to_string())?;
        Ok(())
    }
}
