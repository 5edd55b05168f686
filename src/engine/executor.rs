//! `ExecutionEngine`: the state machine advancing a single instance under a
//! held per-instance lock.
//!
//! One generic type drives every workflow — FlowForge workflows are data
//! (activity graphs loaded from the Persistence Port), not compiled Rust
//! state machines, so there is no per-workflow-type registration the way a
//! replay-based executor would need.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::activity::{ActivityContext, ActivityRegistry, ActivityResult, RegistryError, ServiceLocator};
use crate::error::EngineError;
use crate::expression::EvalContext;
use crate::lock::{instance_lock_key, LockError, LockManager};
use crate::model::{
    ActivityExecution, ActivityStatus, InstanceError, InstanceStatus, JsonMap, WorkflowInstance,
    SUSPEND_KEY,
};
use crate::persistence::{DefinitionStore, ExecutionStore, InstanceStore, Persistence, StoreError};
use crate::reliability::{resolve_timeout, run_with_timeout, TimedOutcome};

use super::transition::{choose_transition, project_output};
use super::validate::validate_input;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Lock(#[from] LockError),
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub default_timeout: Duration,
    pub default_retry_policy: crate::reliability::RetryPolicy,
    pub lock_lease: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(3600),
            default_retry_policy: crate::reliability::RetryPolicy::default(),
            lock_lease: Duration::from_secs(5 * 60),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            default_timeout: std::env::var("ENGINE_DEFAULT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.default_timeout),
            default_retry_policy: crate::reliability::RetryPolicy {
                max_attempts: std::env::var("ENGINE_RETRY_MAX_ATTEMPTS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.default_retry_policy.max_attempts),
                initial_delay: std::env::var("ENGINE_RETRY_INITIAL_DELAY_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(default.default_retry_policy.initial_delay),
                max_delay: std::env::var("ENGINE_RETRY_MAX_DELAY_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(default.default_retry_policy.max_delay),
                backoff_multiplier: std::env::var("ENGINE_RETRY_BACKOFF_MULTIPLIER")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.default_retry_policy.backoff_multiplier),
                retry_on: Vec::new(),
                do_not_retry_on: Vec::new(),
            },
            lock_lease: default.lock_lease,
        }
    }
}

pub struct ExecutionEngine<S: Persistence> {
    store: Arc<S>,
    activities: Arc<ActivityRegistry>,
    locks: Arc<dyn LockManager>,
    services: Arc<ServiceLocator>,
    config: EngineConfig,
}

impl<S: Persistence> ExecutionEngine<S> {
    pub fn new(
        store: Arc<S>,
        activities: Arc<ActivityRegistry>,
        locks: Arc<dyn LockManager>,
        services: Arc<ServiceLocator>,
        config: EngineConfig,
    ) -> Self {
        Self { store, activities, locks, services, config }
    }

    /// Resolves the active definition for `name`; validates `input` against
    /// `input_schema`; creates the instance `Pending` at `start_activity_id`.
    /// Does not execute.
    #[instrument(skip(self, input))]
    pub async fn start(
        &self,
        name: &str,
        input: JsonMap,
        correlation_id: Option<String>,
        parent_instance_id: Option<Uuid>,
    ) -> Result<WorkflowInstance, ExecutorError> {
        let definition = DefinitionStore::get(self.store.as_ref(), name, None)
            .await
            .map_err(|_| EngineError::WorkflowNotFound(name.to_string()))?;

        if !definition.is_active {
            return Err(EngineError::WorkflowInactive(name.to_string()).into());
        }

        if let Some(schema) = &definition.input_schema {
            validate_input(schema, &input).map_err(EngineError::InvalidInput)?;
        }

        let instance = WorkflowInstance::new(
            definition.name.clone(),
            definition.version,
            definition.start_activity_id.clone(),
            input,
            correlation_id,
            parent_instance_id,
        );
        let instance = InstanceStore::create(self.store.as_ref(), instance).await?;
        Ok(instance)
    }

    /// Acquires the instance lock, loads the instance, and runs the
    /// advancement loop. Terminal instances are returned unchanged.
    #[instrument(skip(self, cancellation))]
    pub async fn execute(
        &self,
        instance_id: Uuid,
        cancellation: CancellationToken,
    ) -> Result<WorkflowInstance, ExecutorError> {
        let key = instance_lock_key(instance_id);
        let handle = self
            .locks
            .acquire(&key, self.config.lock_lease)
            .await?
            .ok_or_else(|| EngineError::LockFailed(key.clone()))?;

        let result = self.execute_locked(instance_id, cancellation).await;

        self.locks.release(handle).await?;
        result
    }

    async fn execute_locked(
        &self,
        instance_id: Uuid,
        cancellation: CancellationToken,
    ) -> Result<WorkflowInstance, ExecutorError> {
        let mut instance = InstanceStore::get(self.store.as_ref(), instance_id).await?;
        if instance.status.is_terminal() {
            return Ok(instance);
        }

        if instance.status == InstanceStatus::Pending {
            instance.status = InstanceStatus::Running;
            instance.started_at = Some(Utc::now());
        }

        let definition = DefinitionStore::get(
            self.store.as_ref(),
            &instance.workflow_name,
            Some(instance.workflow_version),
        )
        .await?;

        self.advance(&mut instance, &definition, &cancellation).await?;

        let cancelled = instance.status == InstanceStatus::Cancelled && cancellation.is_cancelled();
        instance = InstanceStore::update(self.store.as_ref(), instance).await?;

        if cancelled {
            return Err(EngineError::Unexpected("execution cancelled".into()).into());
        }
        Ok(instance)
    }

    async fn advance(
        &self,
        instance: &mut WorkflowInstance,
        definition: &crate::model::WorkflowDefinition,
        cancellation: &CancellationToken,
    ) -> Result<(), ExecutorError> {
        while instance.status == InstanceStatus::Running {
            if cancellation.is_cancelled() {
                instance.status = InstanceStatus::Cancelled;
                instance.completed_at = Some(Utc::now());
                instance.current_activity_id = None;
                return Ok(());
            }

            let Some(activity_id) = instance.current_activity_id.clone() else {
                instance.status = InstanceStatus::Completed;
                instance.completed_at = Some(Utc::now());
                instance.output = project_output(definition, &instance.state);
                instance.current_activity_id = None;
                return Ok(());
            };

            let Some(activity) = definition.find_activity(&activity_id) else {
                return Err(EngineError::ActivityNotFound(activity_id).into());
            };

            if let Some(condition) = &activity.condition {
                let ctx = EvalContext::new(&instance.input, &instance.state, &instance.output);
                if !crate::expression::evaluate_predicate(&ctx, condition) {
                    instance.current_activity_id = choose_transition(definition, &activity_id, &ctx);
                    continue;
                }
            }

            let resolved_input = resolve_input(instance, activity);

            let handler = self
                .activities
                .lookup(&activity.activity_type)
                .map_err(|_| EngineError::UnknownActivityType(activity.activity_type.clone()))?;

            let timeout = resolve_timeout(activity.timeout, definition.timeout, self.config.default_timeout);
            let attempt = instance.retry_count + 1;

            let mut execution = ActivityExecution::started(
                instance.id,
                activity_id.clone(),
                activity.activity_type.clone(),
                resolved_input.clone(),
                attempt,
            );
            ExecutionStore::create(self.store.as_ref(), execution.clone()).await?;

            let outcome = {
                let ctx = ActivityContext {
                    instance: &*instance,
                    activity_id: &activity_id,
                    input: resolved_input,
                    attempt,
                    cancellation: cancellation.clone(),
                    services: self.services.clone(),
                };
                run_with_timeout(handler.execute(&ctx), timeout, cancellation).await
            };

            match outcome {
                TimedOutcome::Cancelled => {
                    instance.status = InstanceStatus::Cancelled;
                    instance.completed_at = Some(Utc::now());
                    instance.current_activity_id = None;
                    return Ok(());
                }
                TimedOutcome::TimedOut => {
                    let error = InstanceError {
                        code: "TIMEOUT".into(),
                        message: format!("activity '{activity_id}' exceeded {timeout:?}"),
                        activity_id: Some(activity_id.clone()),
                        occurred_at: Utc::now(),
                    };
                    execution.finish(ActivityStatus::Failed, JsonMap::new(), Some(error.clone()));
                    ExecutionStore::update(self.store.as_ref(), execution).await?;
                    self.handle_failure(instance, definition, activity, &activity_id, error, true, cancellation)
                        .await?;
                }
                TimedOutcome::Completed(result) => match result {
                    ActivityResult::Ok { output, next_activity_id } => {
                        execution.finish(ActivityStatus::Completed, output.clone(), None);
                        ExecutionStore::update(self.store.as_ref(), execution).await?;
                        instance.retry_count = 0;
                        for (state_key, output_name) in &activity.output_mappings {
                            if let Some(value) = output.get(output_name) {
                                instance.state.insert(state_key.clone(), value.clone());
                            }
                        }
                        let ctx = EvalContext::new(&instance.input, &instance.state, &instance.output);
                        let next = next_activity_id.or_else(|| choose_transition(definition, &activity_id, &ctx));
                        match next {
                            Some(next) => instance.current_activity_id = Some(next),
                            None => {
                                instance.status = InstanceStatus::Completed;
                                instance.completed_at = Some(Utc::now());
                                instance.output = project_output(definition, &instance.state);
                                instance.current_activity_id = None;
                                return Ok(());
                            }
                        }
                    }
                    ActivityResult::Suspend { suspend_key } => {
                        execution.finish(ActivityStatus::Completed, JsonMap::new(), None);
                        ExecutionStore::update(self.store.as_ref(), execution).await?;
                        instance.status = InstanceStatus::Suspended;
                        instance.state.insert(SUSPEND_KEY.to_string(), serde_json::json!(suspend_key));
                        return Ok(());
                    }
                    ActivityResult::Fail { error } => {
                        let instance_error = InstanceError {
                            code: error.code.clone(),
                            message: error.message.clone(),
                            activity_id: Some(activity_id.clone()),
                            occurred_at: Utc::now(),
                        };
                        execution.finish(ActivityStatus::Failed, JsonMap::new(), Some(instance_error.clone()));
                        ExecutionStore::update(self.store.as_ref(), execution).await?;
                        self.handle_failure(
                            instance,
                            definition,
                            activity,
                            &activity_id,
                            instance_error,
                            error.retriable,
                            cancellation,
                        )
                        .await?;
                    }
                },
            }
        }
        Ok(())
    }

    /// Retry decision (§4.3.5): retries in place honoring cancellation
    /// during the backoff sleep, else fails the workflow.
    async fn handle_failure(
        &self,
        instance: &mut WorkflowInstance,
        definition: &crate::model::WorkflowDefinition,
        activity: &crate::model::ActivityDefinition,
        activity_id: &str,
        error: InstanceError,
        retriable: bool,
        cancellation: &CancellationToken,
    ) -> Result<(), ExecutorError> {
        let policy = activity
            .retry_policy
            .clone()
            .or_else(|| definition.default_retry_policy.clone())
            .unwrap_or_else(|| self.config.default_retry_policy.clone());

        if policy.permits_retry(instance.retry_count, retriable, &error.code) {
            instance.retry_count += 1;
            let delay = policy.delay_for_retry(instance.retry_count);
            debug!(activity_id, retry_count = instance.retry_count, ?delay, "retrying activity");
            tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    instance.status = InstanceStatus::Cancelled;
                    instance.completed_at = Some(Utc::now());
                    instance.current_activity_id = None;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            return Ok(());
        }

        warn!(activity_id, code = %error.code, "activity exhausted retries, failing workflow");
        instance.status = InstanceStatus::Failed;
        instance.error = Some(error);
        instance.completed_at = Some(Utc::now());
        instance.current_activity_id = None;
        Ok(())
    }

    /// Validates the instance is `Suspended` and its `_suspend_key` matches
    /// `signal_name`; writes `state.signal_<k>=v`; advances past the
    /// suspended activity via transition rules, then calls `execute`.
    #[instrument(skip(self, data, cancellation))]
    pub async fn resume_with_signal(
        &self,
        instance_id: Uuid,
        signal_name: &str,
        data: JsonMap,
        cancellation: CancellationToken,
    ) -> Result<WorkflowInstance, ExecutorError> {
        let mut instance = InstanceStore::get(self.store.as_ref(), instance_id).await?;
        if instance.status != InstanceStatus::Suspended {
            return Err(EngineError::NotSuspended(instance_id.to_string()).into());
        }
        if instance.suspend_key() != Some(signal_name) {
            return Err(EngineError::SignalMismatch(signal_name.to_string()).into());
        }

        for (key, value) in data.iter() {
            instance.state.insert(format!("signal_{key}"), value.clone());
        }
        instance.state.remove(SUSPEND_KEY);

        let definition = DefinitionStore::get(
            self.store.as_ref(),
            &instance.workflow_name,
            Some(instance.workflow_version),
        )
        .await?;
        if let Some(activity_id) = instance.current_activity_id.clone() {
            let ctx = EvalContext::new(&instance.input, &instance.state, &instance.output);
            instance.current_activity_id = choose_transition(&definition, &activity_id, &ctx);
        }
        instance.status = InstanceStatus::Running;
        InstanceStore::update(self.store.as_ref(), instance).await?;

        self.execute(instance_id, cancellation).await
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, instance_id: Uuid) -> Result<WorkflowInstance, ExecutorError> {
        let mut instance = InstanceStore::get(self.store.as_ref(), instance_id).await?;
        if instance.status.is_terminal() {
            return Ok(instance);
        }
        instance.status = InstanceStatus::Cancelled;
        instance.completed_at = Some(Utc::now());
        instance.current_activity_id = None;
        instance = InstanceStore::update(self.store.as_ref(), instance).await?;
        Ok(instance)
    }
}

fn resolve_input(instance: &WorkflowInstance, activity: &crate::model::ActivityDefinition) -> JsonMap {
    let ctx = EvalContext::new(&instance.input, &instance.state, &instance.output);
    let mut resolved = JsonMap::new();
    for (name, expr) in &activity.input_mappings {
        resolved.insert(name.clone(), crate::expression::resolve_path(&ctx, expr));
    }
    resolved
}

#[async_trait::async_trait]
impl<S: Persistence> crate::scheduler::InstanceStarter for ExecutionEngine<S> {
    async fn start(&self, workflow_name: &str, input: JsonMap) -> Result<Uuid, String> {
        ExecutionEngine::start(self, workflow_name, input, None, None)
            .await
            .map(|instance| instance.id)
            .map_err(|e| e.to_string())
    }
}
