//! Activity handler contract and registry.
//!
//! Activities are string-typed, JSON-in/JSON-out units of work dispatched
//! by the execution engine. They:
//! - May fail and be retried according to the activity or definition's
//!   retry policy
//! - May suspend the instance, to be resumed by an external signal
//! - Receive their dependencies through an explicit [`ServiceLocator`],
//!   never ambient globals

mod context;
mod definition;
mod registry;

pub use context::{ActivityContext, ServiceLocator};
pub use definition::{ActivityError, ActivityHandler, ActivityResult};
pub use registry::{ActivityRegistry, RegistryError};
