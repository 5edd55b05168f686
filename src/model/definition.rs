//! `WorkflowDefinition`: the versioned, immutable-once-saved blueprint of
//! activities and transitions a [`crate::engine::ExecutionEngine`] drives
//! instances through.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::JsonMap;
use crate::reliability::RetryPolicy;

/// How a definition's instances come into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Manual,
    Scheduled,
    Event,
    ChildWorkflow,
    Workflow,
}

impl TriggerType {
    pub fn ordinal(self) -> i32 {
        match self {
            Self::Manual => 0,
            Self::Scheduled => 1,
            Self::Event => 2,
            Self::ChildWorkflow => 3,
            Self::Workflow => 4,
        }
    }
}

/// One named step in a definition's activity graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    #[serde(default)]
    pub properties: JsonMap,
    /// `input_name -> expression`, evaluated against the instance before
    /// dispatch.
    #[serde(default)]
    pub input_mappings: std::collections::HashMap<String, String>,
    /// `state_key -> output_name`, applied after a successful attempt.
    #[serde(default)]
    pub output_mappings: std::collections::HashMap<String, String>,
    /// Pre-execution skip predicate; a false evaluation advances past this
    /// activity without executing it.
    pub condition: Option<String>,
    #[serde(default, with = "crate::duration_millis::option")]
    pub timeout: Option<Duration>,
    pub retry_policy: Option<RetryPolicy>,
}

/// A directed, optionally-guarded edge between two activities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionDefinition {
    pub from: String,
    pub to: String,
    pub condition: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub is_default: bool,
}

fn default_priority() -> i32 {
    100
}

/// A JSON-schema-shaped input/output validation descriptor: the engine
/// only inspects `required` and each property's `type` (see
/// [`crate::engine::validate_input`]).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchemaDescriptor {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub properties: std::collections::HashMap<String, PropertySchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub property_type: String,
}

/// Versioned, immutable-once-saved workflow blueprint. Primary key is
/// `(name, version)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub name: String,
    pub version: u32,
    pub start_activity_id: String,
    pub activities: Vec<ActivityDefinition>,
    pub transitions: Vec<TransitionDefinition>,
    pub input_schema: Option<SchemaDescriptor>,
    pub output_schema: Option<SchemaDescriptor>,
    #[serde(default = "default_trigger")]
    pub trigger: TriggerType,
    pub cron_expression: Option<String>,
    pub default_retry_policy: Option<RetryPolicy>,
    #[serde(default, with = "crate::duration_millis::option")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

fn default_trigger() -> TriggerType {
    TriggerType::Manual
}

fn default_true() -> bool {
    true
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DefinitionError {
    #[error("start_activity_id '{0}' is not among the definition's activities")]
    UnknownStartActivity(String),
    #[error("transition references unknown activity id '{0}'")]
    UnknownTransitionEndpoint(String),
    #[error("duplicate activity id '{0}'")]
    DuplicateActivityId(String),
    #[error("trigger is Scheduled but cron_expression is missing or unparseable")]
    InvalidCronTrigger,
}

impl WorkflowDefinition {
    /// Validates the structural invariants from the data model: activity
    /// ids are unique, `start_activity_id` and every transition endpoint
    /// resolve to a known activity, and a Scheduled trigger carries a
    /// parseable cron expression.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let mut ids = HashSet::new();
        for activity in &self.activities {
            if !ids.insert(activity.id.as_str()) {
                return Err(DefinitionError::DuplicateActivityId(activity.id.clone()));
            }
        }

        if !ids.contains(self.start_activity_id.as_str()) {
            return Err(DefinitionError::UnknownStartActivity(
                self.start_activity_id.clone(),
            ));
        }

        for transition in &self.transitions {
            if !ids.contains(transition.from.as_str()) {
                return Err(DefinitionError::UnknownTransitionEndpoint(
                    transition.from.clone(),
                ));
            }
            if !ids.contains(transition.to.as_str()) {
                return Err(DefinitionError::UnknownTransitionEndpoint(
                    transition.to.clone(),
                ));
            }
        }

        if self.trigger == TriggerType::Scheduled {
            match &self.cron_expression {
                Some(expr) if expr.parse::<cron::Schedule>().is_ok() => {}
                _ => return Err(DefinitionError::InvalidCronTrigger),
            }
        }

        Ok(())
    }

    pub fn find_activity(&self, id: &str) -> Option<&ActivityDefinition> {
        self.activities.iter().find(|a| a.id == id)
    }

    pub fn transitions_from(&self, from: &str) -> Vec<&TransitionDefinition> {
        let mut matches: Vec<&TransitionDefinition> =
            self.transitions.iter().filter(|t| t.from == from).collect();
        matches.sort_by_key(|t| t.priority);
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn base_definition() -> WorkflowDefinition {
        WorkflowDefinition {
            name: "hello".into(),
            version: 1,
            start_activity_id: "a".into(),
            activities: vec![ActivityDefinition {
                id: "a".into(),
                activity_type: "log".into(),
                properties: JsonMap::new(),
                input_mappings: Default::default(),
                output_mappings: Default::default(),
                condition: None,
                timeout: None,
                retry_policy: None,
            }],
            transitions: vec![],
            input_schema: None,
            output_schema: None,
            trigger: TriggerType::Manual,
            cron_expression: None,
            default_retry_policy: None,
            timeout: None,
            tags: vec![],
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn validates_clean_definition() {
        assert!(base_definition().validate().is_ok());
    }

    #[test]
    fn rejects_unknown_start_activity() {
        let mut def = base_definition();
        def.start_activity_id = "missing".into();
        assert_eq!(
            def.validate(),
            Err(DefinitionError::UnknownStartActivity("missing".into()))
        );
    }

    #[test]
    fn rejects_transition_to_unknown_activity() {
        let mut def = base_definition();
        def.transitions.push(TransitionDefinition {
            from: "a".into(),
            to: "ghost".into(),
            condition: None,
            priority: 100,
            is_default: true,
        });
        assert!(def.validate().is_err());
    }

    #[test]
    fn scheduled_trigger_requires_parseable_cron() {
        let mut def = base_definition();
        def.trigger = TriggerType::Scheduled;
        assert_eq!(def.validate(), Err(DefinitionError::InvalidCronTrigger));
        def.cron_expression = Some("0 * * * * *".into());
        assert!(def.validate().is_ok());
    }

    #[test]
    fn transitions_from_sorts_by_priority() {
        let mut def = base_definition();
        def.activities.push(ActivityDefinition {
            id: "b".into(),
            activity_type: "log".into(),
            properties: JsonMap::new(),
            input_mappings: Default::default(),
            output_mappings: Default::default(),
            condition: None,
            timeout: None,
            retry_policy: None,
        });
        def.transitions.push(TransitionDefinition {
            from: "a".into(),
            to: "b".into(),
            condition: None,
            priority: 200,
            is_default: true,
        });
        def.transitions.push(TransitionDefinition {
            from: "a".into(),
            to: "b".into(),
            condition: Some("input.n > 10".into()),
            priority: 10,
            is_default: false,
        });
        let ordered = def.transitions_from("a");
        assert_eq!(ordered[0].priority, 10);
        assert_eq!(ordered[1].priority, 200);
    }
}
