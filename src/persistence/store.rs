//! The Persistence Port: three repositories (definitions, instances,
//! executions) the engine drives instances through. Every operation is
//! wall-clock bounded by its caller (the engine wraps each call in its
//! own short-lived scope; the port never holds a lock across handler
//! invocation).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{ActivityExecution, InstanceStatus, WorkflowDefinition, WorkflowInstance};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("DEFINITION_NOT_FOUND: {0}")]
    DefinitionNotFound(String),
    #[error("INSTANCE_NOT_FOUND: {0}")]
    InstanceNotFound(String),
    #[error("execution record not found: {0}")]
    ExecutionNotFound(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

#[derive(Debug, Clone, Default)]
pub struct InstanceFilter {
    pub workflow_name: Option<String>,
    pub status: Option<InstanceStatus>,
    pub correlation_id: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { offset: 0, limit: 50 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstanceStats {
    pub total: u64,
    pub by_status: std::collections::HashMap<i32, u64>,
}

/// CRUD for versioned workflow definitions.
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    async fn get(&self, name: &str, version: Option<u32>) -> Result<WorkflowDefinition, StoreError>;
    async fn get_all_versions(&self, name: &str) -> Result<Vec<WorkflowDefinition>, StoreError>;
    async fn list(&self, include_inactive: bool) -> Result<Vec<WorkflowDefinition>, StoreError>;
    /// Auto-increments `version` and atomically deactivates prior
    /// versions of the same name.
    async fn save(&self, definition: WorkflowDefinition) -> Result<WorkflowDefinition, StoreError>;
    async fn set_active(&self, name: &str, version: u32, active: bool) -> Result<(), StoreError>;
    async fn delete(&self, name: &str, version: u32) -> Result<(), StoreError>;
    async fn exists(&self, name: &str) -> Result<bool, StoreError>;
}

/// CRUD + query for live instances.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<WorkflowInstance, StoreError>;
    async fn get_by_correlation(&self, correlation_id: &str) -> Result<WorkflowInstance, StoreError>;
    async fn query(
        &self,
        filter: InstanceFilter,
        page: Pagination,
    ) -> Result<Vec<WorkflowInstance>, StoreError>;
    async fn get_by_status(&self, status: InstanceStatus, limit: u64) -> Result<Vec<WorkflowInstance>, StoreError>;
    async fn create(&self, instance: WorkflowInstance) -> Result<WorkflowInstance, StoreError>;
    async fn update(&self, instance: WorkflowInstance) -> Result<WorkflowInstance, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
    /// Running instances whose `updated_at < now - older_than`.
    async fn get_timed_out(&self, older_than: chrono::Duration) -> Result<Vec<WorkflowInstance>, StoreError>;
    async fn stats(&self) -> Result<InstanceStats, StoreError>;
}

/// Append-only per-attempt audit trail.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Ordered by `started_at` ascending.
    async fn get_by_instance(&self, instance_id: Uuid) -> Result<Vec<ActivityExecution>, StoreError>;
    async fn get(&self, id: Uuid) -> Result<ActivityExecution, StoreError>;
    async fn create(&self, execution: ActivityExecution) -> Result<ActivityExecution, StoreError>;
    async fn update(&self, execution: ActivityExecution) -> Result<ActivityExecution, StoreError>;
    /// By max attempt.
    async fn get_latest(
        &self,
        instance_id: Uuid,
        activity_id: &str,
    ) -> Result<Option<ActivityExecution>, StoreError>;
}

/// The combined bound the execution engine is generic over.
pub trait Persistence: DefinitionStore + InstanceStore + ExecutionStore {}
impl<T: DefinitionStore + InstanceStore + ExecutionStore> Persistence for T {}

pub fn timed_out_cutoff(older_than: chrono::Duration) -> DateTime<Utc> {
    Utc::now() - older_than
}
