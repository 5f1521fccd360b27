// # Memory Datastore
//
// In-memory implementation of Datastore.
//
// ## Purpose
//
// Serves the customer profiles built by ingestion. Nothing is persisted;
// the store is rebuilt from the record source on every start.
//
// ## Locking
//
// The whole registry sits behind one `tokio::sync::RwLock`:
// - `get`, `list`, `total_customers` take the read lock and may run together
// - `create`, `update`, `delete` take the write lock and are serialized
//
// Granularity is the whole registry, not the customer: `delete` moves
// another customer inside the dense storage.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, oneshot};
use tracing::debug;

use crate::config::IngestConfig;
use crate::error::Result;
use crate::reconciler::Reconciler;
use crate::registry::CustomerRegistry;
use crate::traits::{Customer, CustomerId, Datastore, RecordSource, Timestamp};

/// In-memory datastore implementation
///
/// Cloning is cheap and every clone shares the same registry, so one clone
/// can be handed to each request handler.
///
/// # Example
///
/// ```rust,no_run
/// use custstore_core::source::MemoryRecordSource;
/// use custstore_core::store::MemoryDatastore;
/// use custstore_core::traits::{Datastore, Record};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut source = MemoryRecordSource::new(vec![
///         Record::event("e1", "1", "open", 10),
///     ]);
///     let store = MemoryDatastore::load(&mut source, None).await?;
///
///     let customer = store.get(1).await?;
///     assert_eq!(customer.events["open"], 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryDatastore {
    inner: Arc<RwLock<CustomerRegistry>>,
}

impl MemoryDatastore {
    /// Create a new empty datastore
    pub fn new() -> Self {
        Self::from_registry(CustomerRegistry::new())
    }

    /// Wrap a populated registry for serving
    pub fn from_registry(registry: CustomerRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    /// Build a datastore by ingesting a record source with default settings
    ///
    /// The event receiver is dropped up front, so ingestion events are
    /// discarded without backing up the channel. Use [`Reconciler`] directly
    /// to observe them.
    pub async fn load(
        source: &mut dyn RecordSource,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<Self> {
        let (reconciler, _) = Reconciler::new(&IngestConfig::default())?;
        let registry = reconciler.ingest(source, shutdown_rx).await?;
        Ok(Self::from_registry(registry))
    }

    /// Check the registry's index against its storage
    pub async fn check_index(&self) -> Result<()> {
        self.inner.read().await.check_index()
    }

    fn now() -> Timestamp {
        chrono::Utc::now().timestamp()
    }
}

impl Default for MemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn get(&self, id: CustomerId) -> Result<Customer> {
        let guard = self.inner.read().await;
        guard.get(id).cloned()
    }

    async fn list(&self, page: usize, count: usize) -> Result<Vec<Customer>> {
        let guard = self.inner.read().await;
        Ok(guard.list(page, count).to_vec())
    }

    async fn create(
        &self,
        id: CustomerId,
        attributes: HashMap<String, String>,
    ) -> Result<Customer> {
        let mut guard = self.inner.write().await;
        let customer = guard.create(id, &attributes, Self::now())?.clone();
        debug!("Created customer {}", id);
        Ok(customer)
    }

    async fn update(
        &self,
        id: CustomerId,
        attributes: HashMap<String, String>,
    ) -> Result<Customer> {
        let mut guard = self.inner.write().await;
        let customer = guard.update(id, &attributes, Self::now())?.clone();
        debug!("Updated customer {} ({} attributes)", id, attributes.len());
        Ok(customer)
    }

    async fn delete(&self, id: CustomerId) -> Result<()> {
        let mut guard = self.inner.write().await;
        guard.delete(id)?;
        debug!("Deleted customer {}", id);
        Ok(())
    }

    async fn total_customers(&self) -> Result<usize> {
        Ok(self.inner.read().await.len())
    }
}
