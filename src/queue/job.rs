//! `Job`: the queue message requesting the engine act on an instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// What a [`Job`] asks the engine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobType {
    Start,
    Continue,
    Resume,
    Retry,
    Cancel,
}

impl JobType {
    pub fn ordinal(self) -> i32 {
        match self {
            Self::Start => 0,
            Self::Continue => 1,
            Self::Resume => 2,
            Self::Retry => 3,
            Self::Cancel => 4,
        }
    }

    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        Some(match ordinal {
            0 => Self::Start,
            1 => Self::Continue,
            2 => Self::Resume,
            3 => Self::Retry,
            4 => Self::Cancel,
            _ => return None,
        })
    }
}

impl Serialize for JobType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.ordinal())
    }
}

impl<'de> Deserialize<'de> for JobType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let ordinal = i32::deserialize(deserializer)?;
        Self::from_ordinal(ordinal)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid job type ordinal {ordinal}")))
    }
}

/// `{messageId, instanceId, activityId?, type, queuedAt, priority, attempt}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub message_id: Uuid,
    pub instance_id: Uuid,
    pub activity_id: Option<String>,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub queued_at: DateTime<Utc>,
    pub priority: i32,
    pub attempt: u32,
}

impl Job {
    /// Assigns a fresh `message_id` and stamps `queued_at = now`, as
    /// `publish` is required to.
    pub fn new(instance_id: Uuid, activity_id: Option<String>, job_type: JobType, priority: i32) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            instance_id,
            activity_id,
            job_type,
            queued_at: Utc::now(),
            priority,
            attempt: 0,
        }
    }

    /// Composite `(priority, queued_at)` ordering key: lower priority
    /// fires first, `queued_at` tiebreaks earliest-first.
    pub fn sort_key(&self) -> (i32, DateTime<Utc>) {
        (self.priority, self.queued_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_roundtrip() {
        for jt in [
            JobType::Start,
            JobType::Continue,
            JobType::Resume,
            JobType::Retry,
            JobType::Cancel,
        ] {
            assert_eq!(JobType::from_ordinal(jt.ordinal()), Some(jt));
        }
    }

    #[test]
    fn serializes_type_as_ordinal() {
        let job = Job::new(Uuid::now_v7(), None, JobType::Start, 100);
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["type"], 0);
        assert_eq!(value["priority"], 100);
    }
}
