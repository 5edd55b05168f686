//! PostgreSQL implementation of the Persistence Port.
//!
//! Assumes `flowforge_definitions`, `flowforge_instances`, and
//! `flowforge_executions` tables already exist (schema creation is a
//! Control-Plane/deployment concern, out of scope for the engine
//! kernel). Uses a connection pool; every statement is a short-lived,
//! independent transaction — the engine never holds a database
//! transaction open across an activity handler call.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{error, instrument};
use uuid::Uuid;

use crate::model::{ActivityExecution, InstanceStatus, WorkflowDefinition, WorkflowInstance};

use super::store::{
    DefinitionStore, ExecutionStore, InstanceFilter, InstanceStats, InstanceStore, Pagination,
    StoreError,
};

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_err(e: sqlx::Error) -> StoreError {
    error!("postgres error: {e}");
    StoreError::Database(e.to_string())
}

fn definition_from_row(row: &sqlx::postgres::PgRow) -> Result<WorkflowDefinition, StoreError> {
    let payload: serde_json::Value = row.get("payload");
    serde_json::from_value(payload).map_err(|e| StoreError::Database(e.to_string()))
}

fn instance_from_row(row: &sqlx::postgres::PgRow) -> Result<WorkflowInstance, StoreError> {
    let payload: serde_json::Value = row.get("payload");
    serde_json::from_value(payload).map_err(|e| StoreError::Database(e.to_string()))
}

fn execution_from_row(row: &sqlx::postgres::PgRow) -> Result<ActivityExecution, StoreError> {
    let payload: serde_json::Value = row.get("payload");
    serde_json::from_value(payload).map_err(|e| StoreError::Database(e.to_string()))
}

#[async_trait]
impl DefinitionStore for PostgresStore {
    #[instrument(skip(self))]
    async fn get(&self, name: &str, version: Option<u32>) -> Result<WorkflowDefinition, StoreError> {
        let row = match version {
            Some(v) => sqlx::query(
                "SELECT payload FROM flowforge_definitions WHERE name = $1 AND version = $2",
            )
            .bind(name)
            .bind(v as i32)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?,
            None => sqlx::query(
                "SELECT payload FROM flowforge_definitions WHERE name = $1 AND is_active \
                 ORDER BY version DESC LIMIT 1",
            )
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?,
        };
        let row = row.ok_or_else(|| StoreError::DefinitionNotFound(name.to_string()))?;
        definition_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn get_all_versions(&self, name: &str) -> Result<Vec<WorkflowDefinition>, StoreError> {
        let rows = sqlx::query(
            "SELECT payload FROM flowforge_definitions WHERE name = $1 ORDER BY version",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(definition_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn list(&self, include_inactive: bool) -> Result<Vec<WorkflowDefinition>, StoreError> {
        let rows = if include_inactive {
            sqlx::query("SELECT payload FROM flowforge_definitions ORDER BY name, version")
                .fetch_all(&self.pool)
                .await
        } else {
            sqlx::query(
                "SELECT payload FROM flowforge_definitions WHERE is_active ORDER BY name, version",
            )
            .fetch_all(&self.pool)
            .await
        }
        .map_err(db_err)?;
        rows.iter().map(definition_from_row).collect()
    }

    #[instrument(skip(self, definition))]
    async fn save(&self, mut definition: WorkflowDefinition) -> Result<WorkflowDefinition, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let next_version: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM flowforge_definitions WHERE name = $1",
        )
        .bind(&definition.name)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query("UPDATE flowforge_definitions SET is_active = false WHERE name = $1")
            .bind(&definition.name)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        definition.version = next_version as u32;
        definition.is_active = true;
        let payload = serde_json::to_value(&definition).map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            "INSERT INTO flowforge_definitions (name, version, is_active, payload) \
             VALUES ($1, $2, true, $3)",
        )
        .bind(&definition.name)
        .bind(next_version)
        .bind(&payload)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(definition)
    }

    #[instrument(skip(self))]
    async fn set_active(&self, name: &str, version: u32, active: bool) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE flowforge_definitions SET is_active = $3 WHERE name = $1 AND version = $2",
        )
        .bind(name)
        .bind(version as i32)
        .bind(active)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::DefinitionNotFound(format!("{name}@{version}")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, name: &str, version: u32) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM flowforge_definitions WHERE name = $1 AND version = $2")
            .bind(name)
            .bind(version as i32)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM flowforge_definitions WHERE name = $1")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(count > 0)
    }
}

#[async_trait]
impl InstanceStore for PostgresStore {
    #[instrument(skip(self))]
    async fn get(&self, id: Uuid) -> Result<WorkflowInstance, StoreError> {
        let row = sqlx::query("SELECT payload FROM flowforge_instances WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| StoreError::InstanceNotFound(id.to_string()))?;
        instance_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn get_by_correlation(&self, correlation_id: &str) -> Result<WorkflowInstance, StoreError> {
        let row = sqlx::query(
            "SELECT payload FROM flowforge_instances WHERE correlation_id = $1 \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(correlation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| StoreError::InstanceNotFound(correlation_id.to_string()))?;
        instance_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn query(
        &self,
        filter: InstanceFilter,
        page: Pagination,
    ) -> Result<Vec<WorkflowInstance>, StoreError> {
        let rows = sqlx::query(
            "SELECT payload FROM flowforge_instances \
             WHERE ($1::text IS NULL OR workflow_name = $1) \
               AND ($2::int IS NULL OR status = $2) \
               AND ($3::text IS NULL OR correlation_id = $3) \
             ORDER BY created_at ASC OFFSET $4 LIMIT $5",
        )
        .bind(filter.workflow_name)
        .bind(filter.status.map(|s| s.ordinal()))
        .bind(filter.correlation_id)
        .bind(page.offset as i64)
        .bind(page.limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(instance_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn get_by_status(&self, status: InstanceStatus, limit: u64) -> Result<Vec<WorkflowInstance>, StoreError> {
        let rows = sqlx::query(
            "SELECT payload FROM flowforge_instances WHERE status = $1 LIMIT $2",
        )
        .bind(status.ordinal())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(instance_from_row).collect()
    }

    #[instrument(skip(self, instance))]
    async fn create(&self, instance: WorkflowInstance) -> Result<WorkflowInstance, StoreError> {
        let payload = serde_json::to_value(&instance).map_err(|e| StoreError::Database(e.to_string()))?;
        sqlx::query(
            "INSERT INTO flowforge_instances (id, workflow_name, status, correlation_id, created_at, updated_at, payload) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(instance.id)
        .bind(&instance.workflow_name)
        .bind(instance.status.ordinal())
        .bind(&instance.correlation_id)
        .bind(instance.created_at)
        .bind(instance.updated_at)
        .bind(&payload)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(instance)
    }

    #[instrument(skip(self, instance))]
    async fn update(&self, mut instance: WorkflowInstance) -> Result<WorkflowInstance, StoreError> {
        instance.updated_at = chrono::Utc::now();
        let payload = serde_json::to_value(&instance).map_err(|e| StoreError::Database(e.to_string()))?;
        let result = sqlx::query(
            "UPDATE flowforge_instances SET status = $2, updated_at = $3, payload = $4 WHERE id = $1",
        )
        .bind(instance.id)
        .bind(instance.status.ordinal())
        .bind(instance.updated_at)
        .bind(&payload)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::InstanceNotFound(instance.id.to_string()));
        }
        Ok(instance)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM flowforge_instances WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_timed_out(&self, older_than: chrono::Duration) -> Result<Vec<WorkflowInstance>, StoreError> {
        let cutoff = super::store::timed_out_cutoff(older_than);
        let rows = sqlx::query(
            "SELECT payload FROM flowforge_instances WHERE status = $1 AND updated_at < $2",
        )
        .bind(InstanceStatus::Running.ordinal())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(instance_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn stats(&self) -> Result<InstanceStats, StoreError> {
        let rows = sqlx::query("SELECT status, COUNT(*) as count FROM flowforge_instances GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        let mut by_status = std::collections::HashMap::new();
        let mut total = 0u64;
        for row in rows {
            let status: i32 = row.get("status");
            let count: i64 = row.get("count");
            total += count as u64;
            by_status.insert(status, count as u64);
        }
        Ok(InstanceStats { total, by_status })
    }
}

#[async_trait]
impl ExecutionStore for PostgresStore {
    #[instrument(skip(self))]
    async fn get_by_instance(&self, instance_id: Uuid) -> Result<Vec<ActivityExecution>, StoreError> {
        let rows = sqlx::query(
            "SELECT payload FROM flowforge_executions WHERE workflow_instance_id = $1 ORDER BY started_at ASC",
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(execution_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn get(&self, id: Uuid) -> Result<ActivityExecution, StoreError> {
        let row = sqlx::query("SELECT payload FROM flowforge_executions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| StoreError::ExecutionNotFound(id.to_string()))?;
        execution_from_row(&row)
    }

    #[instrument(skip(self, execution))]
    async fn create(&self, execution: ActivityExecution) -> Result<ActivityExecution, StoreError> {
        let payload = serde_json::to_value(&execution).map_err(|e| StoreError::Database(e.to_string()))?;
        sqlx::query(
            "INSERT INTO flowforge_executions \
             (id, workflow_instance_id, activity_id, attempt, started_at, payload) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(execution.id)
        .bind(execution.workflow_instance_id)
        .bind(&execution.activity_id)
        .bind(execution.attempt as i32)
        .bind(execution.started_at)
        .bind(&payload)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(execution)
    }

    #[instrument(skip(self, execution))]
    async fn update(&self, execution: ActivityExecution) -> Result<ActivityExecution, StoreError> {
        let payload = serde_json::to_value(&execution).map_err(|e| StoreError::Database(e.to_string()))?;
        let result = sqlx::query("UPDATE flowforge_executions SET payload = $2 WHERE id = $1")
            .bind(execution.id)
            .bind(&payload)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::ExecutionNotFound(execution.id.to_string()));
        }
        Ok(execution)
    }

    #[instrument(skip(self))]
    async fn get_latest(
        &self,
        instance_id: Uuid,
        activity_id: &str,
    ) -> Result<Option<ActivityExecution>, StoreError> {
        let row = sqlx::query(
            "SELECT payload FROM flowforge_executions \
             WHERE workflow_instance_id = $1 AND activity_id = $2 \
             ORDER BY attempt DESC LIMIT 1",
        )
        .bind(instance_id)
        .bind(activity_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(execution_from_row).transpose()
    }
}
