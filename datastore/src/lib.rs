//! Persistence core: entity-level create/read/update/delete over pluggable
//! storage backends.
//!
//! Callers work through a [`DataContext`] obtained from a
//! [`DataContextFactory`]. Queries are [`Specification`]s evaluated the same
//! way by every backend; a [`Schema`] maps each entity type to its
//! [`DataStore`] and resolves declared [`Navigation`]s so reads return
//! entities with related records attached. Writes are tracked by a
//! [`UnitOfWork`] and committed together.
//!
//! Backends implement [`CrudAdapter`] per entity type, plus [`Session`] when
//! they can make a commit atomic. [`MemoryTable`] is the in-memory backend.

pub mod adapters;
pub mod context;
pub mod entity;
pub mod error;
pub mod event;
pub mod navigation;
pub mod schema;
pub mod specification;
pub mod store;
pub mod unit_of_work;

#[cfg(test)]
mod fixtures;

pub use adapters::MemoryTable;
pub use context::{DataContext, DataContextFactory};
pub use entity::{Entity, EntityId, UNASSIGNED_ID};
pub use error::{
    ChangeRef, CommitFailure, ConfigError, PersistError, PersistResult, StoreError, StoreResult,
};
pub use event::{EntityEvent, EntityObserver, Lifecycle};
pub use navigation::Navigation;
pub use schema::{Schema, SchemaBuilder};
pub use specification::Specification;
pub use store::{CrudAdapter, DataStore, Filter};
pub use unit_of_work::{
    AppliedChange, ChangeOp, CommitReport, EntityState, EntryHandle, NoopSession, Session,
    UnitOfWork,
};
