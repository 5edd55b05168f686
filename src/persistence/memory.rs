//! In-memory Persistence Port backends for unit and integration tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::model::{ActivityExecution, InstanceStatus, WorkflowDefinition, WorkflowInstance};

use super::store::{
    DefinitionStore, ExecutionStore, InstanceFilter, InstanceStats, InstanceStore, Pagination,
    StoreError,
};

#[derive(Default)]
pub struct InMemoryDefinitionStore {
    // keyed by name -> versions, newest last
    by_name: RwLock<HashMap<String, Vec<WorkflowDefinition>>>,
}

impl InMemoryDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DefinitionStore for InMemoryDefinitionStore {
    async fn get(&self, name: &str, version: Option<u32>) -> Result<WorkflowDefinition, StoreError> {
        let by_name = self.by_name.read();
        let versions = by_name
            .get(name)
            .ok_or_else(|| StoreError::DefinitionNotFound(name.to_string()))?;
        let found = match version {
            Some(v) => versions.iter().find(|d| d.version == v),
            None => versions.iter().filter(|d| d.is_active).max_by_key(|d| d.version),
        };
        found
            .cloned()
            .ok_or_else(|| StoreError::DefinitionNotFound(name.to_string()))
    }

    async fn get_all_versions(&self, name: &str) -> Result<Vec<WorkflowDefinition>, StoreError> {
        Ok(self.by_name.read().get(name).cloned().unwrap_or_default())
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<WorkflowDefinition>, StoreError> {
        let by_name = self.by_name.read();
        Ok(by_name
            .values()
            .flat_map(|versions| versions.iter())
            .filter(|d| include_inactive || d.is_active)
            .cloned()
            .collect())
    }

    async fn save(&self, mut definition: WorkflowDefinition) -> Result<WorkflowDefinition, StoreError> {
        let mut by_name = self.by_name.write();
        let versions = by_name.entry(definition.name.clone()).or_default();
        let next_version = versions.iter().map(|d| d.version).max().unwrap_or(0) + 1;
        for prior in versions.iter_mut() {
            prior.is_active = false;
        }
        definition.version = next_version;
        definition.is_active = true;
        versions.push(definition.clone());
        Ok(definition)
    }

    async fn set_active(&self, name: &str, version: u32, active: bool) -> Result<(), StoreError> {
        let mut by_name = self.by_name.write();
        let versions = by_name
            .get_mut(name)
            .ok_or_else(|| StoreError::DefinitionNotFound(name.to_string()))?;
        let def = versions
            .iter_mut()
            .find(|d| d.version == version)
            .ok_or_else(|| StoreError::DefinitionNotFound(format!("{name}@{version}")))?;
        def.is_active = active;
        Ok(())
    }

    async fn delete(&self, name: &str, version: u32) -> Result<(), StoreError> {
        let mut by_name = self.by_name.write();
        if let Some(versions) = by_name.get_mut(name) {
            versions.retain(|d| d.version != version);
        }
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.by_name.read().contains_key(name))
    }
}

#[derive(Default)]
pub struct InMemoryInstanceStore {
    instances: RwLock<HashMap<Uuid, WorkflowInstance>>,
}

impl InMemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstanceStore for InMemoryInstanceStore {
    async fn get(&self, id: Uuid) -> Result<WorkflowInstance, StoreError> {
        self.instances
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::InstanceNotFound(id.to_string()))
    }

    async fn get_by_correlation(&self, correlation_id: &str) -> Result<WorkflowInstance, StoreError> {
        self.instances
            .read()
            .values()
            .find(|i| i.correlation_id.as_deref() == Some(correlation_id))
            .cloned()
            .ok_or_else(|| StoreError::InstanceNotFound(correlation_id.to_string()))
    }

    async fn query(
        &self,
        filter: InstanceFilter,
        page: Pagination,
    ) -> Result<Vec<WorkflowInstance>, StoreError> {
        let instances = self.instances.read();
        let mut matches: Vec<WorkflowInstance> = instances
            .values()
            .filter(|i| {
                filter
                    .workflow_name
                    .as_ref()
                    .map(|n| &i.workflow_name == n)
                    .unwrap_or(true)
                    && filter.status.map(|s| i.status == s).unwrap_or(true)
                    && filter
                        .correlation_id
                        .as_ref()
                        .map(|c| i.correlation_id.as_deref() == Some(c.as_str()))
                        .unwrap_or(true)
            })
            .cloned()
            .collect();
        matches.sort_by_key(|i| i.created_at);
        let start = (page.offset as usize).min(matches.len());
        let end = (start + page.limit as usize).min(matches.len());
        Ok(matches[start..end].to_vec())
    }

    async fn get_by_status(&self, status: InstanceStatus, limit: u64) -> Result<Vec<WorkflowInstance>, StoreError> {
        Ok(self
            .instances
            .read()
            .values()
            .filter(|i| i.status == status)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn create(&self, instance: WorkflowInstance) -> Result<WorkflowInstance, StoreError> {
        self.instances.write().insert(instance.id, instance.clone());
        Ok(instance)
    }

    async fn update(&self, instance: WorkflowInstance) -> Result<WorkflowInstance, StoreError> {
        let mut instances = self.instances.write();
        if !instances.contains_key(&instance.id) {
            return Err(StoreError::InstanceNotFound(instance.id.to_string()));
        }
        instances.insert(instance.id, instance.clone());
        Ok(instance)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.instances.write().remove(&id);
        Ok(())
    }

    async fn get_timed_out(&self, older_than: chrono::Duration) -> Result<Vec<WorkflowInstance>, StoreError> {
        let cutoff = super::store::timed_out_cutoff(older_than);
        Ok(self
            .instances
            .read()
            .values()
            .filter(|i| i.status == InstanceStatus::Running && i.updated_at < cutoff)
            .cloned()
            .collect())
    }

    async fn stats(&self) -> Result<InstanceStats, StoreError> {
        let instances = self.instances.read();
        let mut by_status = std::collections::HashMap::new();
        for instance in instances.values() {
            *by_status.entry(instance.status.ordinal()).or_insert(0u64) += 1;
        }
        Ok(InstanceStats {
            total: instances.len() as u64,
            by_status,
        })
    }
}

#[derive(Default)]
pub struct InMemoryExecutionStore {
    executions: RwLock<HashMap<Uuid, ActivityExecution>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn get_by_instance(&self, instance_id: Uuid) -> Result<Vec<ActivityExecution>, StoreError> {
        let mut matches: Vec<ActivityExecution> = self
            .executions
            .read()
            .values()
            .filter(|e| e.workflow_instance_id == instance_id)
            .cloned()
            .collect();
        matches.sort_by_key(|e| e.started_at);
        Ok(matches)
    }

    async fn get(&self, id: Uuid) -> Result<ActivityExecution, StoreError> {
        self.executions
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::ExecutionNotFound(id.to_string()))
    }

    async fn create(&self, execution: ActivityExecution) -> Result<ActivityExecution, StoreError> {
        self.executions.write().insert(execution.id, execution.clone());
        Ok(execution)
    }

    async fn update(&self, execution: ActivityExecution) -> Result<ActivityExecution, StoreError> {
        let mut executions = self.executions.write();
        if !executions.contains_key(&execution.id) {
            return Err(StoreError::ExecutionNotFound(execution.id.to_string()));
        }
        executions.insert(execution.id, execution.clone());
        Ok(execution)
    }

    async fn get_latest(
        &self,
        instance_id: Uuid,
        activity_id: &str,
    ) -> Result<Option<ActivityExecution>, StoreError> {
        Ok(self
            .executions
            .read()
            .values()
            .filter(|e| e.workflow_instance_id == instance_id && e.activity_id == activity_id)
            .max_by_key(|e| e.attempt)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_definition(name: &str) -> WorkflowDefinition {
        WorkflowDefinition {
            name: name.into(),
            version: 0,
            start_activity_id: "a".into(),
            activities: vec![],
            transitions: vec![],
            input_schema: None,
            output_schema: None,
            trigger: crate::model::TriggerType::Manual,
            cron_expression: None,
            default_retry_policy: None,
            timeout: None,
            tags: vec![],
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_twice_increments_version_and_deactivates_prior() {
        let store = InMemoryDefinitionStore::new();
        let v1 = store.save(sample_definition("hello")).await.unwrap();
        let v2 = store.save(sample_definition("hello")).await.unwrap();
        assert_eq!(v1.version, 1);
        assert_eq!(v2.version, 2);

        let active = store.get("hello", None).await.unwrap();
        assert_eq!(active.version, 2);

        let all = store.get_all_versions("hello").await.unwrap();
        assert!(!all.iter().find(|d| d.version == 1).unwrap().is_active);
    }

    #[tokio::test]
    async fn instance_update_requires_prior_create() {
        let store = InMemoryInstanceStore::new();
        let instance =
            WorkflowInstance::new("hello".into(), 1, "a".into(), Default::default(), None, None);
        assert!(store.update(instance.clone()).await.is_err());
        store.create(instance.clone()).await.unwrap();
        assert!(store.update(instance).await.is_ok());
    }
}
