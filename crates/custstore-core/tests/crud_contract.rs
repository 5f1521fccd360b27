//! Contract Test: CRUD Operations
//!
//! This test verifies the operations the serving layer relies on.
//!
//! Constraints verified:
//! - Create rejects taken ids; Get/Update/Delete reject unknown ids
//! - Update merges attributes without touching events
//! - Delete followed by Create with the same id starts from scratch
//! - The id → position index stays exact across any Create/Delete sequence
//!
//! If this test fails, the datastore's public contract has changed.

mod common;

use common::*;
use custstore_core::error::Error;
use custstore_core::source::MemoryRecordSource;
use custstore_core::traits::{Datastore, Record};
use custstore_core::{CustomerRegistry, MemoryDatastore};
use std::collections::HashMap;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn create_same_id_twice_fails() {
    let store = MemoryDatastore::new();

    assert_ok!(store.create(5, HashMap::new()).await);
    let second = store.create(5, HashMap::new()).await;

    assert!(matches!(second, Err(Error::AlreadyExists(5))));
    assert_eq!(store.total_customers().await.unwrap(), 1);
}

#[tokio::test]
async fn get_on_empty_store_is_not_found() {
    let store = MemoryDatastore::new();
    assert!(matches!(store.get(999).await, Err(Error::NotFound(999))));
}

#[tokio::test]
async fn update_and_delete_unknown_ids_fail() {
    let store = MemoryDatastore::new();

    assert!(matches!(
        store.update(1, attrs(&[("a", "b")])).await,
        Err(Error::NotFound(1))
    ));
    assert!(matches!(store.delete(1).await, Err(Error::NotFound(1))));
}

#[tokio::test]
async fn update_merges_attributes_and_keeps_events() {
    let mut source = MemoryRecordSource::new(vec![
        Record::event("e1", "1", "open", 10),
        Record::attributes("a1", "1", [("color", "red"), ("plan", "free")], 10),
    ]);
    let store = MemoryDatastore::load(&mut source, None).await.unwrap();

    let updated = assert_ok!(store.update(1, attrs(&[("plan", "pro")])).await);

    assert_eq!(updated.attributes, attrs(&[("color", "red"), ("plan", "pro")]));
    assert_eq!(updated.events["open"], 1);
    assert!(updated.last_updated >= 10);
    assert_eq!(store.get(1).await.unwrap(), updated);
}

#[tokio::test]
async fn update_never_lowers_a_future_watermark() {
    let far_future = chrono::Utc::now().timestamp() + 86_400;
    let mut source = MemoryRecordSource::new(vec![Record::attributes(
        "a1",
        "1",
        [("color", "red")],
        far_future,
    )]);
    let store = MemoryDatastore::load(&mut source, None).await.unwrap();

    let updated = store.update(1, attrs(&[("color", "blue")])).await.unwrap();
    assert_eq!(updated.last_updated, far_future);
}

#[tokio::test]
async fn delete_then_recreate_does_not_resurrect_state() {
    let mut source = MemoryRecordSource::new(vec![
        Record::event("e1", "1", "open", 10),
        Record::attributes("a1", "1", [("color", "red")], 10),
    ]);
    let store = MemoryDatastore::load(&mut source, None).await.unwrap();

    assert_ok!(store.delete(1).await);
    assert_err!(store.get(1).await);

    let recreated = store.create(1, attrs(&[("plan", "pro")])).await.unwrap();
    assert_eq!(recreated.attributes, attrs(&[("plan", "pro")]));
    assert!(recreated.events.is_empty());
}

#[tokio::test]
async fn list_returns_every_customer_regardless_of_pagination() {
    let store = MemoryDatastore::new();
    for id in 1..=4 {
        store.create(id, HashMap::new()).await.unwrap();
    }
    store.delete(2).await.unwrap();

    let mut ids: Vec<i64> = store
        .list(1, 1)
        .await
        .unwrap()
        .iter()
        .map(|customer| customer.id)
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 3, 4]);
}

#[test]
fn deleting_any_position_keeps_index_exact() {
    // Every length up to 9 (odd and even), every victim position
    for len in 1..=9i64 {
        for victim in 0..len {
            let mut registry = CustomerRegistry::new();
            for id in 0..len {
                registry.create(id, &HashMap::new(), 0).unwrap();
            }

            registry.delete(victim).unwrap();

            registry.check_index().unwrap();
            for customer in registry.customers() {
                assert_eq!(registry.get(customer.id).unwrap().id, customer.id);
            }
            assert!(!registry.contains(victim));
        }
    }
}

#[test]
fn index_stays_exact_across_mixed_sequences() {
    // Deterministic pseudo-random walk over creates and deletes
    let mut registry = CustomerRegistry::new();
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;

    for _ in 0..2_000 {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;

        let id = (state % 64) as i64;
        if state % 3 == 0 {
            let _ = registry.delete(id);
        } else {
            let _ = registry.create(id, &HashMap::new(), 0);
        }

        registry.check_index().unwrap();
    }
}
