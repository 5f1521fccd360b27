// # Datastore Trait
//
// Defines the CRUD contract the serving layer is allowed to call.
//
// ## Purpose
//
// The datastore exposes consolidated customer profiles after ingestion:
// - Point lookup, insert, update and delete by customer id
// - Full listing for scans
// - Customer count
//
// ## Implementations
//
// - In-memory: `MemoryDatastore` (this crate)
// - Future: persistent backends implementing the same trait
//
// ## Usage
//
// ```rust,ignore
// use custstore_core::Datastore;
// use std::collections::HashMap;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* Datastore implementation */;
//
//     let customer = store.create(42, HashMap::new()).await?;
//     let same = store.get(customer.id).await?;
//
//     store.delete(42).await?;
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Customer identity
pub type CustomerId = i64;

/// Timestamp in whole seconds since the Unix epoch
pub type Timestamp = i64;

/// A consolidated customer profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Unique, immutable customer id
    pub id: CustomerId,
    /// Attribute name to value, overwritten per key on update
    pub attributes: HashMap<String, String>,
    /// Event name to occurrence count
    pub events: HashMap<String, u64>,
    /// Watermark: the newest timestamp seen for this customer
    pub last_updated: Timestamp,
}

impl Customer {
    /// Create an empty customer with the given watermark
    pub fn new(id: CustomerId, last_updated: Timestamp) -> Self {
        Self {
            id,
            attributes: HashMap::new(),
            events: HashMap::new(),
            last_updated,
        }
    }

    /// Overwrite each supplied attribute, leaving untouched keys in place
    pub fn merge_attributes<'a, I>(&mut self, attributes: I)
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (name, value) in attributes {
            self.attributes.insert(name.clone(), value.clone());
        }
    }

    /// Raise the watermark if `timestamp` is newer; never lowers it
    pub fn advance_watermark(&mut self, timestamp: Timestamp) {
        if timestamp > self.last_updated {
            self.last_updated = timestamp;
        }
    }
}

/// Trait for datastore implementations
///
/// This is the only surface the serving layer may call. Implementations must
/// be safe to share across concurrently running request handlers.
///
/// # Thread Safety
///
/// Reads (`get`, `list`, `total_customers`) may run concurrently with each
/// other. Writes (`create`, `update`, `delete`) are linearized relative to
/// each other and to reads.
///
/// # Errors
///
/// Errors are returned directly to the caller and are never retried
/// internally.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Get a customer by id
    ///
    /// # Returns
    ///
    /// - `Ok(Customer)`: A snapshot of the stored customer
    /// - `Err(Error::NotFound)`: No customer with this id
    async fn get(&self, id: CustomerId) -> Result<Customer, crate::Error>;

    /// List all customers
    ///
    /// Customers come back in current storage order, which carries no meaning
    /// and may change after any `delete`.
    ///
    /// `page` and `count` are accepted but **not applied**: the full set is
    /// always returned. Callers must not rely on pagination.
    async fn list(&self, page: usize, count: usize) -> Result<Vec<Customer>, crate::Error>;

    /// Create a customer with the given attributes
    ///
    /// The watermark is set to the current wall-clock time.
    ///
    /// # Returns
    ///
    /// - `Ok(Customer)`: The created customer
    /// - `Err(Error::AlreadyExists)`: The id is taken
    async fn create(
        &self,
        id: CustomerId,
        attributes: HashMap<String, String>,
    ) -> Result<Customer, crate::Error>;

    /// Merge attributes into an existing customer
    ///
    /// Supplied keys overwrite existing values; other keys are kept.
    ///
    /// # Returns
    ///
    /// - `Ok(Customer)`: The updated customer
    /// - `Err(Error::NotFound)`: No customer with this id
    async fn update(
        &self,
        id: CustomerId,
        attributes: HashMap<String, String>,
    ) -> Result<Customer, crate::Error>;

    /// Delete a customer
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Deleted
    /// - `Err(Error::NotFound)`: No customer with this id
    async fn delete(&self, id: CustomerId) -> Result<(), crate::Error>;

    /// Number of stored customers
    async fn total_customers(&self) -> Result<usize, crate::Error>;
}
