//! The per-call context a handler receives: a read-only instance
//! snapshot, its resolved input, the attempt number, a cancellation
//! signal, and a narrow service locator for handler-internal
//! dependencies (no ambient/global resolution, per the engine's
//! service-location design).

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::model::{JsonMap, WorkflowInstance};

/// Explicit, typed dependency injection for activity handlers. Populated
/// once at startup; handlers declare what they need by calling
/// [`ServiceLocator::get`] with the concrete type they expect.
#[derive(Default)]
pub struct ServiceLocator {
    services: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl ServiceLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Any + Send + Sync>(&mut self, service: Arc<T>) {
        self.services.insert(TypeId::of::<T>(), service);
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|svc| svc.clone().downcast::<T>().ok())
    }
}

/// Context passed to [`crate::activity::ActivityHandler::execute`].
pub struct ActivityContext<'a> {
    /// Read-only snapshot of the instance as of the start of this
    /// attempt. Mutating handlers communicate via the returned
    /// `ActivityResult`, never by reaching back into the instance.
    pub instance: &'a WorkflowInstance,
    pub activity_id: &'a str,
    pub input: JsonMap,
    /// 1-based.
    pub attempt: u32,
    pub cancellation: CancellationToken,
    pub services: Arc<ServiceLocator>,
}

impl<'a> ActivityContext<'a> {
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Clock;

    #[test]
    fn service_locator_resolves_by_concrete_type() {
        let mut locator = ServiceLocator::new();
        locator.register(Arc::new(Clock));
        assert!(locator.get::<Clock>().is_some());
    }

    struct OtherType;

    #[test]
    fn missing_service_resolves_to_none() {
        let locator = ServiceLocator::new();
        assert!(locator.get::<OtherType>().is_none());
    }
}
