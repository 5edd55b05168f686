//! The durable data model: versioned workflow definitions, live instances,
//! and the append-only activity-execution audit trail.

mod definition;
mod execution;
mod instance;
mod signal;

pub use definition::{
    ActivityDefinition, PropertySchema, SchemaDescriptor, TransitionDefinition, TriggerType,
    WorkflowDefinition,
};
pub use execution::{ActivityExecution, ActivityStatus};
pub use instance::{InstanceError, InstanceStatus, WorkflowInstance, SUSPEND_KEY};
pub use signal::ResumeSignal;

use crate::expression::JsonValue;
use serde_json::Map;

pub type JsonMap = Map<String, JsonValue>;
