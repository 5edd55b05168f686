//! The activity handler contract: open-world, string-keyed dispatch over
//! JSON-only input/output (no generic `Input`/`Output` associated types,
//! since the registry must stay dyn-dispatched).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::activity::context::ActivityContext;
use crate::model::JsonMap;

/// `{code, message, retriable}` — the shape a handler reports a failure
/// with. The engine converts a handler panic to this with
/// `retriable = true` and `code` set from the panic payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityError {
    pub code: String,
    pub message: String,
    pub retriable: bool,
}

impl ActivityError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, retriable: bool) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retriable,
        }
    }

    pub fn retriable(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, message, true)
    }

    pub fn permanent(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, message, false)
    }
}

/// The tagged result a handler's single operation returns.
#[derive(Debug, Clone)]
pub enum ActivityResult {
    /// Attempt succeeded. `next_activity_id`, if set, overrides the
    /// engine's own transition-choice logic for this step.
    Ok {
        output: JsonMap,
        next_activity_id: Option<String>,
    },
    /// The instance should suspend and wait for a named signal.
    Suspend { suspend_key: String },
    /// The attempt failed; the engine applies the retry policy.
    Fail { error: ActivityError },
}

impl ActivityResult {
    pub fn ok(output: JsonMap) -> Self {
        Self::Ok {
            output,
            next_activity_id: None,
        }
    }

    pub fn ok_goto(output: JsonMap, next_activity_id: impl Into<String>) -> Self {
        Self::Ok {
            output,
            next_activity_id: Some(next_activity_id.into()),
        }
    }

    pub fn suspend(suspend_key: impl Into<String>) -> Self {
        Self::Suspend {
            suspend_key: suspend_key.into(),
        }
    }

    pub fn fail(error: ActivityError) -> Self {
        Self::Fail { error }
    }
}

/// A handler is identified by a case-insensitive `type` string and
/// exposes a single operation. Handlers are registered at startup and the
/// registry is read-only thereafter (the engine's cross-instance sharing
/// model).
#[async_trait]
pub trait ActivityHandler: Send + Sync {
    async fn execute(&self, ctx: &ActivityContext) -> ActivityResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ServiceLocator;
    use crate::model::WorkflowInstance;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    struct EchoHandler;

    #[async_trait]
    impl ActivityHandler for EchoHandler {
        async fn execute(&self, ctx: &ActivityContext) -> ActivityResult {
            ActivityResult::ok(ctx.input.clone())
        }
    }

    #[tokio::test]
    async fn handler_sees_resolved_input() {
        let mut input = JsonMap::new();
        input.insert("x".into(), serde_json::json!(1));
        let instance = WorkflowInstance::new("w".into(), 1, "a".into(), JsonMap::new(), None, None);

        let ctx = ActivityContext {
            instance: &instance,
            activity_id: "a",
            input: input.clone(),
            attempt: 1,
            cancellation: CancellationToken::new(),
            services: Arc::new(ServiceLocator::new()),
        };

        let handler = EchoHandler;
        match handler.execute(&ctx).await {
            ActivityResult::Ok { output, .. } => assert_eq!(output, input),
            _ => panic!("expected Ok"),
        }
    }
}
