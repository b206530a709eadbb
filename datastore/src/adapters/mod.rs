//! Storage adapters that ship with the core.
//!
//! Relational adapters live in their own crates.

pub mod memory_table;

pub use memory_table::MemoryTable;
