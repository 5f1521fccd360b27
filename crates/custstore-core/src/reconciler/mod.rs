//! Ingestion reconciler
//!
//! The Reconciler is responsible for:
//! - Consuming a RecordSource once, in the order records are yielded
//! - Creating customers on first sighting of a user id
//! - Counting events exactly once per record id
//! - Merging attributes last-writer-wins against the customer watermark
//! - Reporting progress on a bounded event channel
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ RecordSource │─── Record ───┐
//! └──────────────┘              │
//!                               ▼
//!                      ┌──────────────┐
//!                      │  Reconciler  │
//!                      └──────────────┘
//!                               │
//!               ┌───────────────┴───────────────┐
//!               │                               │
//!               ▼                               ▼
//!     ┌──────────────────┐            ┌──────────────┐
//!     │ CustomerRegistry │            │ IngestEvents │
//!     │ (apply)          │            │ (notify)     │
//!     └──────────────────┘            └──────────────┘
//! ```
//!
//! ## Merge Rules
//!
//! 1. Parse the user id; on failure skip the record
//! 2. Create the customer if unseen, with the record timestamp as watermark
//! 3. `event`: skip if the record id was already applied, otherwise count it
//!    `attributes`: apply only if `timestamp >= watermark`
//! 4. Raise the watermark to the record timestamp
//!
//! Events are not ordered against the watermark, but they do raise it. An
//! attribute record that arrives after a newer event is therefore dropped
//! even if it is newer than every earlier attribute record.

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::registry::CustomerRegistry;
use crate::traits::{Record, RecordKind, RecordSource};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt;
use tracing::{debug, error, info, trace, warn};

/// Why a record contributed nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The user id did not parse as a customer id
    InvalidUserId,
    /// The event record carries no record id
    MissingEventId,
    /// The event record id was already applied
    DuplicateEvent,
    /// The attribute record is older than the customer watermark
    StaleAttributes,
}

/// Result of applying a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The record changed events or attributes
    Applied,
    /// The record was dropped
    Skipped(SkipReason),
}

/// Counters for one ingestion pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub records_seen: u64,
    pub records_applied: u64,
    pub invalid_user_ids: u64,
    pub missing_event_ids: u64,
    pub duplicate_events: u64,
    pub stale_attributes: u64,
}

impl IngestStats {
    fn record_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::InvalidUserId => self.invalid_user_ids += 1,
            SkipReason::MissingEventId => self.missing_event_ids += 1,
            SkipReason::DuplicateEvent => self.duplicate_events += 1,
            SkipReason::StaleAttributes => self.stale_attributes += 1,
        }
    }

    /// Total records dropped for any reason
    pub fn records_skipped(&self) -> u64 {
        self.invalid_user_ids
            + self.missing_event_ids
            + self.duplicate_events
            + self.stale_attributes
    }
}

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    /// Ingestion started
    Started { source: &'static str },

    /// A record was dropped
    RecordSkipped { record_id: String, reason: SkipReason },

    /// The source was exhausted
    Completed { stats: IngestStats, customers: usize },

    /// Ingestion stopped on a cancellation signal
    Cancelled { stats: IngestStats },

    /// Ingestion aborted on a fatal error
    Failed { error: String },
}

/// Apply one record to the registry under the merge rules
///
/// # Returns
///
/// - `Ok(Outcome)`: Applied, or skipped as an id-less, duplicate or stale record
/// - `Err(Error::InvalidInput)`: Unparseable user id; nothing was changed
/// - `Err(Error::Invariant)`: The registry is inconsistent
pub fn apply_record(registry: &mut CustomerRegistry, record: &Record) -> Result<Outcome> {
    let id = record.customer_id()?;

    // Without an id an event cannot be deduplicated
    if record.kind == RecordKind::Event && record.id.is_empty() {
        return Ok(Outcome::Skipped(SkipReason::MissingEventId));
    }

    registry.get_or_insert(id, record.timestamp)?;

    let outcome = match record.kind {
        RecordKind::Event => {
            if registry.mark_event_applied(&record.id) {
                let customer = registry.get_mut(id)?;
                *customer.events.entry(record.name.clone()).or_insert(0) += 1;
                Outcome::Applied
            } else {
                Outcome::Skipped(SkipReason::DuplicateEvent)
            }
        }
        RecordKind::Attributes => {
            let customer = registry.get_mut(id)?;
            if record.timestamp >= customer.last_updated {
                customer.merge_attributes(&record.data);
                Outcome::Applied
            } else {
                Outcome::Skipped(SkipReason::StaleAttributes)
            }
        }
    };

    registry.get_mut(id)?.advance_watermark(record.timestamp);

    Ok(outcome)
}

/// Ingestion reconciler
///
/// Drives a single pass over a [`RecordSource`] and applies every record to a
/// [`CustomerRegistry`]. During the pass it is the registry's only writer.
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Run with [`Reconciler::ingest()`] or [`Reconciler::ingest_into()`]
/// 3. Hand the populated registry to the serving phase
///
/// ## Cancellation
///
/// A oneshot signal is checked before each record. On cancellation the pass
/// stops with `Error::Cancelled`; records already applied stay applied.
pub struct Reconciler {
    /// Event sender for external monitoring
    event_tx: mpsc::Sender<IngestEvent>,

    /// Progress log interval in records (0 disables)
    progress_log_interval: u64,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields ingestion events
    pub fn new(config: &IngestConfig) -> Result<(Self, mpsc::Receiver<IngestEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let reconciler = Self {
            event_tx: tx,
            progress_log_interval: config.progress_log_interval,
        };

        Ok((reconciler, rx))
    }

    /// Ingest a source into a fresh registry
    ///
    /// # Returns
    ///
    /// - `Ok(CustomerRegistry)`: The source was exhausted; ready to serve
    /// - `Err(Error::SourceFailure)`: The source terminated abnormally
    /// - `Err(Error::Cancelled)`: The shutdown signal fired
    /// - `Err(Error::Invariant)`: The registry became inconsistent
    pub async fn ingest(
        &self,
        source: &mut dyn RecordSource,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<CustomerRegistry> {
        let mut registry = CustomerRegistry::new();
        self.ingest_into(&mut registry, source, shutdown_rx).await?;
        Ok(registry)
    }

    /// Ingest a source into an existing registry
    ///
    /// On error the registry keeps whatever was applied before the failure.
    pub async fn ingest_into(
        &self,
        registry: &mut CustomerRegistry,
        source: &mut dyn RecordSource,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<IngestStats> {
        let source_name = source.source_name();
        self.emit_event(IngestEvent::Started {
            source: source_name,
        });
        info!("Ingesting records from {} source", source_name);

        let mut records = match source.records() {
            Ok(records) => records,
            Err(e) => return Err(self.fail(e)),
        };

        let mut shutdown_rx = shutdown_rx;
        let mut stats = IngestStats::default();

        loop {
            let next = tokio::select! {
                biased;

                _ = wait_for_shutdown(&mut shutdown_rx) => {
                    info!(
                        "Shutdown signal received, stopping ingestion after {} records",
                        stats.records_seen
                    );
                    self.emit_event(IngestEvent::Cancelled { stats });
                    return Err(Error::Cancelled);
                }

                next = records.next() => next,
            };

            let record = match next {
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    let e = match e {
                        Error::SourceFailure(_) => e,
                        other => Error::source_failure(other.to_string()),
                    };
                    return Err(self.fail(e));
                }
                None => break,
            };

            stats.records_seen += 1;
            self.handle_record(registry, &record, &mut stats)?;

            if self.progress_log_interval > 0
                && stats.records_seen % self.progress_log_interval == 0
            {
                info!(
                    "Ingested {} records, {} customers",
                    stats.records_seen,
                    registry.len()
                );
            }
        }

        debug_assert!(registry.check_index().is_ok());

        info!(
            "Ingestion complete: {} records seen, {} applied, {} skipped, {} customers",
            stats.records_seen,
            stats.records_applied,
            stats.records_skipped(),
            registry.len()
        );
        self.emit_event(IngestEvent::Completed {
            stats,
            customers: registry.len(),
        });

        Ok(stats)
    }

    /// Apply one record, swallowing recoverable errors
    fn handle_record(
        &self,
        registry: &mut CustomerRegistry,
        record: &Record,
        stats: &mut IngestStats,
    ) -> Result<()> {
        let reason = match apply_record(registry, record) {
            Ok(Outcome::Applied) => {
                stats.records_applied += 1;
                return Ok(());
            }
            Ok(Outcome::Skipped(reason)) => {
                debug!("Skipping record {} ({:?})", record.id, reason);
                reason
            }
            Err(e) if !e.is_fatal_for_ingestion() => {
                warn!("Dropping record {}: {}", record.id, e);
                SkipReason::InvalidUserId
            }
            Err(e) => return Err(self.fail(e)),
        };

        stats.record_skip(reason);
        self.emit_event(IngestEvent::RecordSkipped {
            record_id: record.id.clone(),
            reason,
        });
        Ok(())
    }

    /// Log and report a fatal error, handing it back for propagation
    fn fail(&self, error: Error) -> Error {
        error!("Ingestion failed: {}", error);
        self.emit_event(IngestEvent::Failed {
            error: error.to_string(),
        });
        error
    }

    /// Emit an ingestion event
    fn emit_event(&self, event: IngestEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Observers are slower than ingestion; drop rather than stall
                warn!(
                    "Ingest event channel full, dropping event. \
                    Consider increasing event_channel_capacity."
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                trace!("Ingest event receiver dropped");
            }
        }
    }
}

/// Resolve when the shutdown signal fires
///
/// A dropped sender means nobody can cancel any more; the future then stays
/// pending for the rest of the pass.
async fn wait_for_shutdown(shutdown_rx: &mut Option<oneshot::Receiver<()>>) {
    let fired = match shutdown_rx.as_mut() {
        Some(rx) => rx.await.is_ok(),
        None => false,
    };
    if fired {
        return;
    }
    *shutdown_rx = None;
    std::future::pending::<()>().await
}
