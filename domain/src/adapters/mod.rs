//! Adapters that implement storage for the contact model.
//!
//! The in-memory adapter is kept here for tests and local development.

pub mod memory;
