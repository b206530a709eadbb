//! Contact model on top of the `datastore` core.
//!
//! Holds the persisted entity types, the navigation wiring between them, the
//! query specifications the application uses and the in-memory backend.
//! Relational backends live in their own adapter crates.

pub mod adapters;
pub mod entities;
pub mod schema;
pub mod specs;

pub use adapters::memory::{InMemoryDataContextFactory, InMemoryDataList};
pub use entities::{Address, Contact, Name, Phone};
pub use schema::contact_schema;
pub use specs::ContactSpecs;

/// Phone types a contact entry may use.
pub const PHONE_TYPES: [&str; 3] = ["home", "work", "mobile"];
