// # Memory Record Source
//
// Fixture source over records held in memory. Used by tests and by
// embedders that already have parsed records at hand.

use crate::error::{Error, Result};
use crate::traits::{Record, RecordSource, RecordStream};

/// In-memory record source
///
/// Yields its items in order, then ends. An `Err` item models a source that
/// terminates abnormally at that point.
#[derive(Debug, Default)]
pub struct MemoryRecordSource {
    items: Option<Vec<Result<Record>>>,
}

impl MemoryRecordSource {
    /// Create a source that yields the given records
    pub fn new(records: Vec<Record>) -> Self {
        Self::from_items(records.into_iter().map(Ok).collect())
    }

    /// Create a source from raw items, errors included
    pub fn from_items(items: Vec<Result<Record>>) -> Self {
        Self { items: Some(items) }
    }

    /// Whether the stream has already been taken
    pub fn is_consumed(&self) -> bool {
        self.items.is_none()
    }
}

impl RecordSource for MemoryRecordSource {
    fn records(&mut self) -> Result<RecordStream> {
        let items = self
            .items
            .take()
            .ok_or_else(|| Error::source_failure("memory source already consumed"))?;
        Ok(Box::pin(tokio_stream::iter(items)))
    }

    fn source_name(&self) -> &'static str {
        "memory"
    }
}
