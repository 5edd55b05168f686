//! `WorkflowInstance`: a live, mutable execution of a
//! [`crate::model::WorkflowDefinition`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::model::JsonMap;

/// Reserved `state` key holding the signal name an instance is waiting on
/// while `Suspended`.
pub const SUSPEND_KEY: &str = "_suspend_key";

/// `{code, message, activity_id, occurred_at}`, populated only when
/// `status == Failed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceError {
    pub code: String,
    pub message: String,
    pub activity_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Ordinal matches the external interface contract exactly:
/// `Pending=0 … TimedOut=7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceStatus {
    Pending,
    Scheduled,
    Running,
    Suspended,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl InstanceStatus {
    pub fn ordinal(self) -> i32 {
        match self {
            Self::Pending => 0,
            Self::Scheduled => 1,
            Self::Running => 2,
            Self::Suspended => 3,
            Self::Completed => 4,
            Self::Failed => 5,
            Self::Cancelled => 6,
            Self::TimedOut => 7,
        }
    }

    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        Some(match ordinal {
            0 => Self::Pending,
            1 => Self::Scheduled,
            2 => Self::Running,
            3 => Self::Suspended,
            4 => Self::Completed,
            5 => Self::Failed,
            6 => Self::Cancelled,
            7 => Self::TimedOut,
            _ => return None,
        })
    }

    /// `{Completed, Failed, Cancelled, TimedOut}` are absorbing: no
    /// further writes to `status`, `current_activity_id`, or `output`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut)
    }
}

impl Serialize for InstanceStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.ordinal())
    }
}

impl<'de> Deserialize<'de> for InstanceStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let ordinal = i32::deserialize(deserializer)?;
        Self::from_ordinal(ordinal)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid instance status ordinal {ordinal}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInstance {
    pub id: Uuid,
    pub workflow_name: String,
    pub workflow_version: u32,
    pub status: InstanceStatus,
    #[serde(default)]
    pub input: JsonMap,
    #[serde(default)]
    pub output: JsonMap,
    #[serde(default)]
    pub state: JsonMap,
    pub current_activity_id: Option<String>,
    pub error: Option<InstanceError>,
    #[serde(default)]
    pub retry_count: u32,
    pub parent_instance_id: Option<Uuid>,
    pub correlation_id: Option<String>,
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl WorkflowInstance {
    pub fn new(
        workflow_name: String,
        workflow_version: u32,
        start_activity_id: String,
        input: JsonMap,
        correlation_id: Option<String>,
        parent_instance_id: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            workflow_name,
            workflow_version,
            status: InstanceStatus::Pending,
            input,
            output: JsonMap::new(),
            state: JsonMap::new(),
            current_activity_id: Some(start_activity_id),
            error: None,
            retry_count: 0,
            parent_instance_id,
            correlation_id,
            worker_id: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
            tags: Vec::new(),
            metadata: JsonMap::new(),
        }
    }

    pub fn suspend_key(&self) -> Option<&str> {
        self.state.get(SUSPEND_KEY).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_match_the_documented_contract() {
        assert_eq!(InstanceStatus::Pending.ordinal(), 0);
        assert_eq!(InstanceStatus::TimedOut.ordinal(), 7);
        assert_eq!(InstanceStatus::from_ordinal(4), Some(InstanceStatus::Completed));
        assert_eq!(InstanceStatus::from_ordinal(99), None);
    }

    #[test]
    fn terminal_statuses_are_absorbing_by_flag() {
        assert!(InstanceStatus::Completed.is_terminal());
        assert!(InstanceStatus::TimedOut.is_terminal());
        assert!(!InstanceStatus::Running.is_terminal());
        assert!(!InstanceStatus::Suspended.is_terminal());
    }

    #[test]
    fn json_roundtrip_uses_ordinal() {
        let json = serde_json::to_string(&InstanceStatus::Suspended).unwrap();
        assert_eq!(json, "3");
        let back: InstanceStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, InstanceStatus::Suspended);
    }

    #[test]
    fn new_instance_starts_pending_at_the_start_activity() {
        let instance = WorkflowInstance::new(
            "hello".into(),
            1,
            "a".into(),
            JsonMap::new(),
            None,
            None,
        );
        assert_eq!(instance.status, InstanceStatus::Pending);
        assert_eq!(instance.current_activity_id.as_deref(), Some("a"));
        assert!(instance.started_at.is_none());
    }
}
