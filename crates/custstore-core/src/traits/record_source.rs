// # Record Source Trait
//
// Defines the interface for feeding parsed records into ingestion.
//
// ## Implementations
//
// - In-memory fixtures: `MemoryRecordSource` (this crate)
// - JSON-lines files: `custstore-source-file` crate
//
// ## Usage
//
// ```rust,ignore
// use custstore_core::RecordSource;
// use tokio_stream::StreamExt;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let mut source = /* RecordSource implementation */;
//
//     let mut records = source.records()?;
//     while let Some(record) = records.next().await {
//         println!("record: {:?}", record?);
//     }
//
//     Ok(())
// }
// ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;
use tokio_stream::Stream;

use crate::traits::datastore::{CustomerId, Timestamp};

/// Kind of an ingested record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// A named event occurrence, counted per customer
    Event,
    /// A batch of attribute values, merged last-writer-wins
    Attributes,
}

/// A single ingested event or attribute-update fact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Unique per logical event occurrence, used for de-duplication
    #[serde(default)]
    pub id: String,
    /// Customer id as it appears on the wire
    pub user_id: String,
    /// Record kind
    #[serde(rename = "type")]
    pub kind: RecordKind,
    /// Event name (only meaningful for events)
    #[serde(default)]
    pub name: String,
    /// Seconds since the Unix epoch
    pub timestamp: Timestamp,
    /// Attribute values (only meaningful for attribute records)
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl Record {
    /// Create an event record
    pub fn event(
        id: impl Into<String>,
        user_id: impl Into<String>,
        name: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            kind: RecordKind::Event,
            name: name.into(),
            timestamp,
            data: HashMap::new(),
        }
    }

    /// Create an attributes record
    pub fn attributes<K, V>(
        id: impl Into<String>,
        user_id: impl Into<String>,
        data: impl IntoIterator<Item = (K, V)>,
        timestamp: Timestamp,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            kind: RecordKind::Attributes,
            name: String::new(),
            timestamp,
            data: data
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse the wire user id into a customer id
    pub fn customer_id(&self) -> Result<CustomerId, crate::Error> {
        self.user_id.parse().map_err(|e| {
            crate::Error::invalid_input(format!("invalid user id {:?}: {}", self.user_id, e))
        })
    }
}

/// Pull-based record sequence
///
/// Yields `Ok(Record)` per record and ends with `None` on exhaustion. An `Err`
/// item signals abnormal termination; nothing after it is meaningful.
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<Record, crate::Error>> + Send + 'static>>;

/// Trait for record source implementations
///
/// A source is finite and not restartable: `records()` hands out the stream
/// once and fails on every later call.
pub trait RecordSource: Send {
    /// Take the record stream
    ///
    /// # Returns
    ///
    /// - `Ok(RecordStream)`: The record sequence
    /// - `Err(Error::SourceFailure)`: Already consumed, or could not be opened
    fn records(&mut self) -> Result<RecordStream, crate::Error>;

    /// Short name used in logs
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing record sources from configuration
pub trait RecordSourceFactory: Send + Sync {
    /// Create a RecordSource instance from configuration
    fn create(
        &self,
        config: &crate::config::SourceConfig,
    ) -> Result<Box<dyn RecordSource>, crate::Error>;
}
