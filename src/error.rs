//! Engine-wide error taxonomy.
//!
//! Every engine entry point returns `Result<T, EngineError>`; handlers never
//! panic their way out of the advancement loop. Activity-provided error codes
//! are forwarded verbatim through [`EngineError::Activity`].

use thiserror::Error;

/// The tagged error taxonomy engine entry points return.
///
/// Mirrors the error codes enumerated in the external interface contract:
/// each variant's `Display` impl renders the matching `SCREAMING_SNAKE_CASE`
/// code so callers can serialize `{success, error_code, error_message}`
/// without a second mapping table.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("WORKFLOW_NOT_FOUND: {0}")]
    WorkflowNotFound(String),

    #[error("WORKFLOW_INACTIVE: {0}")]
    WorkflowInactive(String),

    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    #[error("INSTANCE_NOT_FOUND: {0}")]
    InstanceNotFound(String),

    #[error("DEFINITION_NOT_FOUND: {0}")]
    DefinitionNotFound(String),

    #[error("LOCK_FAILED: {0}")]
    LockFailed(String),

    #[error("NOT_SUSPENDED: {0}")]
    NotSuspended(String),

    #[error("SIGNAL_MISMATCH: {0}")]
    SignalMismatch(String),

    #[error("ACTIVITY_NOT_FOUND: {0}")]
    ActivityNotFound(String),

    #[error("UNKNOWN_ACTIVITY_TYPE: {0}")]
    UnknownActivityType(String),

    #[error("TIMEOUT: {0}")]
    Timeout(String),

    #[error("{code}: {message}")]
    Activity { code: String, message: String },

    #[error("UNEXPECTED_ERROR: {0}")]
    Unexpected(String),
}

impl EngineError {
    /// The stable error code, independent of the human-readable message.
    pub fn code(&self) -> &str {
        match self {
            Self::WorkflowNotFound(_) => "WORKFLOW_NOT_FOUND",
            Self::WorkflowInactive(_) => "WORKFLOW_INACTIVE",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InstanceNotFound(_) => "INSTANCE_NOT_FOUND",
            Self::DefinitionNotFound(_) => "DEFINITION_NOT_FOUND",
            Self::LockFailed(_) => "LOCK_FAILED",
            Self::NotSuspended(_) => "NOT_SUSPENDED",
            Self::SignalMismatch(_) => "SIGNAL_MISMATCH",
            Self::ActivityNotFound(_) => "ACTIVITY_NOT_FOUND",
            Self::UnknownActivityType(_) => "UNKNOWN_ACTIVITY_TYPE",
            Self::Timeout(_) => "TIMEOUT",
            Self::Activity { code, .. } => code,
            Self::Unexpected(_) => "UNEXPECTED_ERROR",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Activity { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_stable_across_message_changes() {
        let a = EngineError::WorkflowNotFound("hello".into());
        let b = EngineError::WorkflowNotFound("world".into());
        assert_eq!(a.code(), b.code());
        assert_eq!(a.code(), "WORKFLOW_NOT_FOUND");
    }

    #[test]
    fn activity_code_is_forwarded_verbatim() {
        let err = EngineError::Activity {
            code: "PAYMENT_DECLINED".into(),
            message: "card rejected".into(),
        };
        assert_eq!(err.code(), "PAYMENT_DECLINED");
        assert_eq!(err.message(), "card rejected");
    }
}
