// # custstore-core
//
// Core library for the in-memory customer datastore.
//
// ## Architecture Overview
//
// This library consolidates a stream of customer records into profiles:
// - **RecordSource**: Trait for a finite, pull-based feed of parsed records
// - **Reconciler**: Applies records under the merge rules (one pass, one writer)
// - **CustomerRegistry**: Dense customer storage with an id → position index
// - **Datastore**: CRUD trait the serving layer calls
// - **MemoryDatastore**: Lock-guarded registry implementing Datastore
// - **PluginRegistry**: Plugin-based registry for record sources
//
// ## Merge Semantics
//
// 1. **Idempotent events**: an event record id is counted at most once
// 2. **Last-writer-wins attributes**: attribute records older than the
//    customer watermark are dropped
// 3. **Monotonic watermark**: `last_updated` never decreases
//
// ## Lifecycle
//
// Ingestion runs once at startup and must finish before serving begins. A
// source failure or cancellation leaves the datastore unbuilt.

pub mod config;
pub mod error;
pub mod plugins;
pub mod reconciler;
pub mod registry;
pub mod source;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{IngestConfig, SourceConfig, StoreConfig};
pub use error::{Error, Result};
pub use plugins::PluginRegistry;
pub use reconciler::{IngestEvent, IngestStats, Reconciler};
pub use registry::CustomerRegistry;
pub use source::MemoryRecordSource;
pub use store::MemoryDatastore;
pub use traits::{Customer, CustomerId, Datastore, Record, RecordKind, RecordSource};
