//! Test doubles and common utilities for datastore contract tests
//!
//! This module provides controllable record sources and small builders
//! shared by the contract tests.

#![allow(dead_code)]

use custstore_core::config::IngestConfig;
use custstore_core::error::{Error, Result};
use custstore_core::reconciler::{IngestEvent, Reconciler};
use custstore_core::traits::{Record, RecordSource, RecordStream};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// A record source the test feeds on demand
///
/// The stream stays open until the test drops the sender, so ingestion
/// waits on it the way it would on a slow feed.
pub struct ChannelRecordSource {
    rx: Option<mpsc::UnboundedReceiver<Result<Record>>>,
    /// Call counter for records()
    records_call_count: Arc<AtomicUsize>,
}

impl ChannelRecordSource {
    /// Create a new channel source and the sender that feeds it
    pub fn new() -> (Self, mpsc::UnboundedSender<Result<Record>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Self {
            rx: Some(rx),
            records_call_count: Arc::new(AtomicUsize::new(0)),
        };
        (source, tx)
    }

    /// Get the number of times records() was called
    pub fn records_call_count(&self) -> usize {
        self.records_call_count.load(Ordering::SeqCst)
    }
}

impl RecordSource for ChannelRecordSource {
    fn records(&mut self) -> Result<RecordStream> {
        self.records_call_count.fetch_add(1, Ordering::SeqCst);

        let rx = self
            .rx
            .take()
            .ok_or_else(|| Error::source_failure("channel source already consumed"))?;

        Ok(Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx)))
    }

    fn source_name(&self) -> &'static str {
        "channel"
    }
}

/// A source that cannot be opened
pub struct UnopenableSource;

impl RecordSource for UnopenableSource {
    fn records(&mut self) -> Result<RecordStream> {
        Err(Error::source_failure("connection refused"))
    }

    fn source_name(&self) -> &'static str {
        "unopenable"
    }
}

/// Build an attribute map from string pairs
pub fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Reconciler with progress logging disabled
pub fn test_reconciler() -> (Reconciler, mpsc::Receiver<IngestEvent>) {
    let config = IngestConfig {
        event_channel_capacity: 100,
        progress_log_interval: 0,
    };
    Reconciler::new(&config).expect("reconciler construction succeeds")
}

/// Drain every event currently buffered on the channel
pub fn drain_events(rx: &mut mpsc::Receiver<IngestEvent>) -> Vec<IngestEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
