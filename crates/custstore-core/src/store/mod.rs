// # Datastore Implementations
//
// This module provides implementations of the Datastore trait.

pub mod memory;

pub use memory::MemoryDatastore;
