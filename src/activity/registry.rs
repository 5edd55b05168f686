//! Name-to-handler lookup for the activity dispatch table, mirroring the
//! startup-populated, read-only-thereafter registry pattern the engine
//! uses for every cross-instance-shared table.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::activity::definition::ActivityHandler;

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("UNKNOWN_ACTIVITY_TYPE: {0}")]
    UnknownActivityType(String),
    #[error("activity type '{0}' is already registered")]
    DuplicateActivityType(String),
}

/// Case-insensitive `type` string to handler lookup. Populated at
/// startup; immutable thereafter.
#[derive(Default)]
pub struct ActivityRegistry {
    handlers: HashMap<String, Arc<dyn ActivityHandler>>,
}

impl ActivityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        activity_type: impl Into<String>,
        handler: Arc<dyn ActivityHandler>,
    ) -> Result<(), RegistryError> {
        let key = activity_type.into().to_lowercase();
        if self.handlers.contains_key(&key) {
            return Err(RegistryError::DuplicateActivityType(key));
        }
        self.handlers.insert(key, handler);
        Ok(())
    }

    pub fn lookup(&self, activity_type: &str) -> Result<Arc<dyn ActivityHandler>, RegistryError> {
        self.handlers
            .get(&activity_type.to_lowercase())
            .cloned()
            .ok_or_else(|| RegistryError::UnknownActivityType(activity_type.to_string()))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityContext, ActivityResult};
    use async_trait::async_trait;

    struct NoopHandler;

    #[async_trait]
    impl ActivityHandler for NoopHandler {
        async fn execute(&self, _ctx: &ActivityContext) -> ActivityResult {
            ActivityResult::ok(Default::default())
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut registry = ActivityRegistry::new();
        registry.register("Log", Arc::new(NoopHandler)).unwrap();
        assert!(registry.lookup("log").is_ok());
        assert!(registry.lookup("LOG").is_ok());
    }

    #[test]
    fn unknown_type_is_reported() {
        let registry = ActivityRegistry::new();
        assert!(matches!(
            registry.lookup("ghost"),
            Err(RegistryError::UnknownActivityType(ref s)) if s == "ghost"
        ));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ActivityRegistry::new();
        registry.register("log", Arc::new(NoopHandler)).unwrap();
        assert_eq!(
            registry.register("log", Arc::new(NoopHandler)),
            Err(RegistryError::DuplicateActivityType("log".into()))
        );
    }
}
