//! Core traits for the customer datastore
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`Datastore`]: CRUD contract used by the serving layer
//! - [`RecordSource`]: Finite, pull-based feed of parsed records

pub mod datastore;
pub mod record_source;

pub use datastore::{Customer, CustomerId, Datastore, Timestamp};
pub use record_source::{Record, RecordKind, RecordSource, RecordSourceFactory, RecordStream};
