//! Indexed in-memory customer collection
//!
//! The registry keeps customers in a dense `Vec` so listing is a plain slice
//! scan, plus a `HashMap` from customer id to position for O(1) lookup,
//! update and delete.
//!
//! ## Invariants
//!
//! After every mutation:
//! - `index[c.id]` is the position of `c` in `customers`, for every stored
//!   customer, and the index holds no other entries
//! - customer ids are unique
//! - an event record id, once applied, stays applied for the registry's
//!   lifetime (deleting a customer does not forget it)
//! - a customer's watermark never decreases
//!
//! ## Delete
//!
//! Removal swaps the last customer into the vacated slot and truncates. Only
//! the moved customer changes position, so only its index entry is rewritten.
//!
//! The registry is not synchronized. Ingestion owns it exclusively; once
//! serving starts it lives behind the lock in [`MemoryDatastore`].
//!
//! [`MemoryDatastore`]: crate::store::MemoryDatastore

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::traits::{Customer, CustomerId, Timestamp};

/// Dense customer storage with an id → position index
#[derive(Debug, Default, Clone)]
pub struct CustomerRegistry {
    /// Dense storage, order unspecified
    customers: Vec<Customer>,

    /// Customer id to position in `customers`
    index: HashMap<CustomerId, usize>,

    /// Event record ids already counted
    applied_events: HashSet<String>,
}

impl CustomerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored customers
    pub fn len(&self) -> usize {
        self.customers.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    /// Check if a customer exists
    pub fn contains(&self, id: CustomerId) -> bool {
        self.index.contains_key(&id)
    }

    /// Current storage position of a customer
    pub fn position(&self, id: CustomerId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// All customers in storage order
    pub fn customers(&self) -> &[Customer] {
        &self.customers
    }

    /// Get a customer by id
    pub fn get(&self, id: CustomerId) -> Result<&Customer> {
        let pos = self.position(id).ok_or(Error::NotFound(id))?;
        self.customers
            .get(pos)
            .ok_or_else(|| Self::stale_index(id, pos))
    }

    /// Get a mutable customer by id
    pub fn get_mut(&mut self, id: CustomerId) -> Result<&mut Customer> {
        let pos = self.position(id).ok_or(Error::NotFound(id))?;
        self.customers
            .get_mut(pos)
            .ok_or_else(|| Self::stale_index(id, pos))
    }

    /// List customers
    ///
    /// `page` and `count` are accepted but not applied; the whole storage
    /// slice is returned.
    pub fn list(&self, _page: usize, _count: usize) -> &[Customer] {
        &self.customers
    }

    /// Create a customer stamped with `now`
    ///
    /// # Returns
    ///
    /// - `Ok(&Customer)`: The stored customer
    /// - `Err(Error::AlreadyExists)`: The id is taken
    pub fn create(
        &mut self,
        id: CustomerId,
        attributes: &HashMap<String, String>,
        now: Timestamp,
    ) -> Result<&Customer> {
        if self.contains(id) {
            return Err(Error::AlreadyExists(id));
        }

        let mut customer = Customer::new(id, now);
        customer.merge_attributes(attributes);
        let pos = self.push(customer);
        Ok(&self.customers[pos])
    }

    /// Get a customer, creating an empty one stamped with `timestamp` first
    /// if the id has not been seen
    pub fn get_or_insert(
        &mut self,
        id: CustomerId,
        timestamp: Timestamp,
    ) -> Result<&mut Customer> {
        if !self.contains(id) {
            self.push(Customer::new(id, timestamp));
        }
        self.get_mut(id)
    }

    /// Merge attributes into a customer and raise its watermark to `now`
    ///
    /// The watermark is never lowered, even if `now` is behind a timestamp
    /// seen during ingestion.
    pub fn update(
        &mut self,
        id: CustomerId,
        attributes: &HashMap<String, String>,
        now: Timestamp,
    ) -> Result<&Customer> {
        let customer = self.get_mut(id)?;
        customer.merge_attributes(attributes);
        customer.advance_watermark(now);
        Ok(&*customer)
    }

    /// Remove a customer, returning it
    pub fn delete(&mut self, id: CustomerId) -> Result<Customer> {
        let pos = self.position(id).ok_or(Error::NotFound(id))?;
        if pos >= self.customers.len() {
            return Err(Self::stale_index(id, pos));
        }

        self.index.remove(&id);
        let removed = self.customers.swap_remove(pos);

        // The former last element now sits at `pos` (unless we removed the last one)
        if let Some(moved) = self.customers.get(pos) {
            self.index.insert(moved.id, pos);
        }

        Ok(removed)
    }

    /// Record an event id as applied
    ///
    /// Returns `false` if it had already been applied.
    pub fn mark_event_applied(&mut self, record_id: &str) -> bool {
        self.applied_events.insert(record_id.to_string())
    }

    /// Check whether an event id has been applied
    pub fn is_event_applied(&self, record_id: &str) -> bool {
        self.applied_events.contains(record_id)
    }

    /// Number of distinct event ids applied so far
    pub fn applied_event_count(&self) -> usize {
        self.applied_events.len()
    }

    /// Verify that the index is an exact inverse of storage positions
    pub fn check_index(&self) -> Result<()> {
        if self.index.len() != self.customers.len() {
            return Err(Error::invariant(format!(
                "index has {} entries for {} customers",
                self.index.len(),
                self.customers.len()
            )));
        }

        for (pos, customer) in self.customers.iter().enumerate() {
            match self.index.get(&customer.id) {
                Some(&indexed) if indexed == pos => {}
                Some(&indexed) => {
                    return Err(Error::invariant(format!(
                        "customer {} is at {} but indexed at {}",
                        customer.id, pos, indexed
                    )));
                }
                None => {
                    return Err(Error::invariant(format!(
                        "customer {} at {} is not indexed",
                        customer.id, pos
                    )));
                }
            }
        }

        Ok(())
    }

    fn push(&mut self, customer: Customer) -> usize {
        let pos = self.customers.len();
        self.index.insert(customer.id, pos);
        self.customers.push(customer);
        pos
    }

    fn stale_index(id: CustomerId, pos: usize) -> Error {
        Error::invariant(format!(
            "customer {} indexed at {} which is out of bounds",
            id, pos
        ))
    }
}
