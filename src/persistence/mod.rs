//! The Persistence Port: three repositories the execution engine is
//! generic over.
//!
//! - [`DefinitionStore`], [`InstanceStore`], [`ExecutionStore`] — the
//!   port traits, unified by the blanket [`Persistence`] bound.
//! - [`InMemoryDefinitionStore`], [`InMemoryInstanceStore`],
//!   [`InMemoryExecutionStore`] — in-process implementations for tests
//!   and single-node deployments.
//! - [`PostgresStore`] — the production implementation, backed by a
//!   `sqlx::PgPool`.

mod memory;
mod postgres;
mod store;

pub use memory::{InMemoryDefinitionStore, InMemoryExecutionStore, InMemoryInstanceStore};
pub use postgres::PostgresStore;
pub use store::{
    DefinitionStore, ExecutionStore, InstanceFilter, InstanceStats, InstanceStore, Pagination,
    Persistence, StoreError,
};
