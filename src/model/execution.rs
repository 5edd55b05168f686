//! `ActivityExecution`: the append-only per-attempt audit row the engine
//! writes for every activity attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::model::instance::InstanceError;
use crate::model::JsonMap;

/// Ordinal assignment decided for the `ActivityStatus` family: the data
/// model only names `{Running, Completed, Failed, Skipped, Cancelled}`
/// but the external interface contract additionally anchors `Pending=0`
/// and `Cancelled=6`, implying unlisted intermediate ordinals. `TimedOut`
/// is included as a distinct terminal status (a timeout is reported with
/// `error.code=TIMEOUT` but is otherwise a Failed attempt, so it shares
/// the `Failed` ordinal rather than inventing a new one not in the
/// `ActivityStatus` enum named by §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

impl ActivityStatus {
    pub fn ordinal(self) -> i32 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Completed => 2,
            Self::Failed => 3,
            Self::Skipped => 4,
            Self::Cancelled => 6,
        }
    }

    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        Some(match ordinal {
            0 => Self::Pending,
            1 => Self::Running,
            2 => Self::Completed,
            3 => Self::Failed,
            4 => Self::Skipped,
            6 => Self::Cancelled,
            _ => return None,
        })
    }
}

impl Serialize for ActivityStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.ordinal())
    }
}

impl<'de> Deserialize<'de> for ActivityStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let ordinal = i32::deserialize(deserializer)?;
        Self::from_ordinal(ordinal)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid activity status ordinal {ordinal}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityExecution {
    pub id: Uuid,
    pub workflow_instance_id: Uuid,
    pub activity_id: String,
    pub activity_type: String,
    pub status: ActivityStatus,
    #[serde(default)]
    pub input: JsonMap,
    #[serde(default)]
    pub output: JsonMap,
    pub error: Option<InstanceError>,
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

impl ActivityExecution {
    pub fn started(
        workflow_instance_id: Uuid,
        activity_id: String,
        activity_type: String,
        input: JsonMap,
        attempt: u32,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            workflow_instance_id,
            activity_id,
            activity_type,
            status: ActivityStatus::Running,
            input,
            output: JsonMap::new(),
            error: None,
            attempt,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
        }
    }

    pub fn finish(&mut self, status: ActivityStatus, output: JsonMap, error: Option<InstanceError>) {
        let now = Utc::now();
        self.status = status;
        self.output = output;
        self.error = error;
        self.completed_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_matches_start_and_completion() {
        let mut exec = ActivityExecution::started(
            Uuid::now_v7(),
            "a".into(),
            "log".into(),
            JsonMap::new(),
            1,
        );
        exec.finish(ActivityStatus::Completed, JsonMap::new(), None);
        let expected = (exec.completed_at.unwrap() - exec.started_at).num_milliseconds();
        assert_eq!(exec.duration_ms, Some(expected));
    }

    #[test]
    fn ordinal_roundtrip() {
        for status in [
            ActivityStatus::Pending,
            ActivityStatus::Running,
            ActivityStatus::Completed,
            ActivityStatus::Failed,
            ActivityStatus::Skipped,
            ActivityStatus::Cancelled,
        ] {
            assert_eq!(ActivityStatus::from_ordinal(status.ordinal()), Some(status));
        }
    }
}
