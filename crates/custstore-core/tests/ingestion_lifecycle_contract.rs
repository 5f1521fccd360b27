//! Contract Test: Ingestion Lifecycle
//!
//! This test verifies how an ingestion pass ends.
//!
//! Constraints verified:
//! - Exhaustion completes the pass
//! - A shutdown signal stops the pass between records with `Cancelled`
//! - A failing source aborts the pass with `SourceFailure`
//! - Records applied before an abort stay applied
//! - A source is consumed exactly once
//!
//! If this test fails, someone has changed cancellation or failure handling.

mod common;

use common::*;
use custstore_core::error::Error;
use custstore_core::reconciler::IngestEvent;
use custstore_core::source::MemoryRecordSource;
use custstore_core::traits::Record;
use custstore_core::{CustomerRegistry, MemoryDatastore};
use tokio::time::{Duration, timeout};

#[tokio::test]
async fn shutdown_signal_stops_waiting_ingestion() {
    let (mut source, record_tx) = ChannelRecordSource::new();
    let (reconciler, mut event_rx) = test_reconciler();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let handle = tokio::spawn(async move {
        let mut registry = CustomerRegistry::new();
        let result = reconciler
            .ingest_into(&mut registry, &mut source, Some(shutdown_rx))
            .await;
        (registry, result)
    });

    record_tx.send(Ok(Record::event("e1", "1", "open", 10))).unwrap();
    record_tx.send(Ok(Record::event("e2", "2", "open", 11))).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The feed is still open; only the signal can end the pass
    shutdown_tx.send(()).unwrap();

    let (registry, result) = timeout(Duration::from_secs(5), handle)
        .await
        .expect("ingestion stops within 5 seconds")
        .unwrap();

    assert!(matches!(result, Err(Error::Cancelled)));

    // Partial state stands
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.get(1).unwrap().events["open"], 1);

    let events = drain_events(&mut event_rx);
    assert!(events.iter().any(|event| matches!(
        event,
        IngestEvent::Cancelled { stats } if stats.records_seen == 2
    )));
    drop(record_tx);
}

#[tokio::test]
async fn signal_fired_before_start_applies_nothing() {
    let (reconciler, _event_rx) = test_reconciler();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    shutdown_tx.send(()).unwrap();

    let mut source = MemoryRecordSource::new(vec![Record::event("e1", "1", "open", 10)]);
    let mut registry = CustomerRegistry::new();
    let result = reconciler
        .ingest_into(&mut registry, &mut source, Some(shutdown_rx))
        .await;

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn dropped_shutdown_sender_does_not_cancel() {
    let (reconciler, _event_rx) = test_reconciler();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    drop(shutdown_tx);

    let mut source = MemoryRecordSource::new(vec![
        Record::event("e1", "1", "open", 10),
        Record::event("e2", "1", "open", 11),
    ]);
    let registry = reconciler
        .ingest(&mut source, Some(shutdown_rx))
        .await
        .expect("ingestion completes");

    assert_eq!(registry.get(1).unwrap().events["open"], 2);
}

#[tokio::test]
async fn source_error_aborts_ingestion() {
    let (reconciler, mut event_rx) = test_reconciler();
    let mut source = MemoryRecordSource::from_items(vec![
        Ok(Record::event("e1", "1", "open", 10)),
        Err(Error::source_failure("truncated feed")),
        Ok(Record::event("e2", "2", "open", 11)),
    ]);

    let mut registry = CustomerRegistry::new();
    let result = reconciler
        .ingest_into(&mut registry, &mut source, None)
        .await;

    assert!(matches!(result, Err(Error::SourceFailure(_))));
    assert_eq!(registry.len(), 1);
    assert!(!registry.contains(2));

    let events = drain_events(&mut event_rx);
    assert!(matches!(events.last(), Some(IngestEvent::Failed { .. })));
}

#[tokio::test]
async fn non_source_errors_from_the_feed_become_source_failures() {
    let (reconciler, _event_rx) = test_reconciler();
    let mut source =
        MemoryRecordSource::from_items(vec![Err(Error::invariant("decoder crashed"))]);

    let result = reconciler.ingest(&mut source, None).await;
    assert!(matches!(
        result,
        Err(Error::SourceFailure(ref msg)) if msg.contains("decoder crashed")
    ));
}

#[tokio::test]
async fn unopenable_source_fails_fast() {
    let result = MemoryDatastore::load(&mut UnopenableSource, None).await;
    assert!(matches!(result, Err(Error::SourceFailure(_))));
}

#[tokio::test]
async fn source_is_consumed_once() {
    let (mut source, record_tx) = ChannelRecordSource::new();
    drop(record_tx);

    let (reconciler, _event_rx) = test_reconciler();
    let registry = reconciler.ingest(&mut source, None).await.unwrap();
    assert!(registry.is_empty());

    let second = reconciler.ingest(&mut source, None).await;
    assert!(matches!(second, Err(Error::SourceFailure(_))));
    assert_eq!(source.records_call_count(), 2);
}
