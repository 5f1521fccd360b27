// # Record Source Implementations
//
// Sources bundled with the core. File-backed sources live in their own
// plugin crates.

pub mod memory;

pub use memory::MemoryRecordSource;
