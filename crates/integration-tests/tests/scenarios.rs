//! Single-order migration scenarios.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use order_profiles_core::{Address, ProfileCategory};
use order_profiles_integration_tests::{
    address, assert_split_invariants, order_type, single_ctx, split_ctx,
};
use order_profiles_migrator::{
    BatchExecutor, ExecutorConfig, MemoryStore, MigrationPlanner, ProfileAction,
};

// =============================================================================
// Shared profile (Scenario A)
// =============================================================================

#[tokio::test]
async fn test_shared_profile_is_split_into_billing_and_shipping() {
    let store = MemoryStore::new();
    let ny = address("US", "NY", "1 Main St");
    let p1 = store.insert_profile(ProfileCategory::Shared, ny.clone());
    let order = store.insert_order(&order_type(), Some(p1));
    let shipment = store.insert_shipment(order, Some(p1));

    let report = BatchExecutor::new(&store, ExecutorConfig::default())
        .migrate(&[order], &split_ctx())
        .await;

    assert_eq!(report.succeeded, vec![order]);
    assert!(report.failed.is_empty());

    assert_eq!(store.profile(p1).unwrap().category, ProfileCategory::Billing);

    let p2 = store.shipment(shipment).unwrap().shipping_profile.unwrap();
    assert_ne!(p2, p1);
    let copy = store.profile(p2).unwrap();
    assert_eq!(copy.category, ProfileCategory::Shipping);
    assert_eq!(copy.address, ny);
    assert_eq!(store.profiles().len(), 2);

    assert_split_invariants(&store, &[order]);
}

// =============================================================================
// Distinct profiles (Scenario B)
// =============================================================================

#[tokio::test]
async fn test_distinct_profiles_are_retyped_in_place() {
    let store = MemoryStore::new();
    let p3 = store.insert_profile(ProfileCategory::Shared, address("US", "NY", "1 Main St"));
    let p4 = store.insert_profile(ProfileCategory::Shared, address("US", "CA", "2 Side St"));
    let order = store.insert_order(&order_type(), Some(p3));
    let shipment = store.insert_shipment(order, Some(p4));

    let report = BatchExecutor::new(&store, ExecutorConfig::default())
        .migrate(&[order], &split_ctx())
        .await;

    assert_eq!(report.succeeded, vec![order]);
    assert_eq!(report.counters.profiles_duplicated, 0);
    assert_eq!(store.profile(p3).unwrap().category, ProfileCategory::Billing);
    assert_eq!(store.profile(p4).unwrap().category, ProfileCategory::Shipping);
    assert_eq!(store.shipment(shipment).unwrap().shipping_profile, Some(p4));
    assert_eq!(store.profiles().len(), 2);
}

#[tokio::test]
async fn test_equal_addresses_on_distinct_records_are_not_duplicated() {
    let store = MemoryStore::new();
    let same = address("US", "NY", "1 Main St");
    let billing = store.insert_profile(ProfileCategory::Shared, same.clone());
    let shipping = store.insert_profile(ProfileCategory::Shared, same);
    let order = store.insert_order(&order_type(), Some(billing));
    store.insert_shipment(order, Some(shipping));

    let plan = MigrationPlanner::new(&store)
        .plan_for(order, &split_ctx())
        .await
        .unwrap();

    assert_eq!(plan.shipments[0].action, ProfileAction::Retype);
    assert!(!plan.detaches_billing());
}

// =============================================================================
// Empty batch (Scenario C)
// =============================================================================

#[tokio::test]
async fn test_empty_batch_has_no_side_effects() {
    let store = MemoryStore::new();
    let profile = store.insert_profile(ProfileCategory::Shared, Address::new("US", "NY"));
    store.insert_order(&order_type(), Some(profile));

    let report = BatchExecutor::new(&store, ExecutorConfig::default())
        .migrate(&[], &split_ctx())
        .await;

    assert!(report.succeeded.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(report.counters.chunks, 0);
    assert_eq!(store.writes(), 0);
    assert_eq!(store.profile(profile).unwrap().category, ProfileCategory::Shared);
}

// =============================================================================
// Edge cases
// =============================================================================

#[tokio::test]
async fn test_order_without_billing_profile_retypes_shipping_only() {
    let store = MemoryStore::new();
    let shipping = store.insert_profile(ProfileCategory::Shared, Address::new("DE", "BE"));
    let order = store.insert_order(&order_type(), None);
    store.insert_shipment(order, Some(shipping));

    let report = BatchExecutor::new(&store, ExecutorConfig::default())
        .migrate(&[order], &split_ctx())
        .await;

    assert_eq!(report.succeeded, vec![order]);
    assert_eq!(
        store.profile(shipping).unwrap().category,
        ProfileCategory::Shipping
    );
}

#[tokio::test]
async fn test_order_without_shipments_retypes_billing_only() {
    let store = MemoryStore::new();
    let billing = store.insert_profile(ProfileCategory::Shared, Address::new("FR", "IDF"));
    let order = store.insert_order(&order_type(), Some(billing));

    let report = BatchExecutor::new(&store, ExecutorConfig::default())
        .migrate(&[order], &split_ctx())
        .await;

    assert_eq!(report.succeeded, vec![order]);
    assert_eq!(store.profile(billing).unwrap().category, ProfileCategory::Billing);
    assert_eq!(store.profiles().len(), 1);
}

#[tokio::test]
async fn test_single_mode_changes_nothing() {
    let store = MemoryStore::new();
    let shared = store.insert_profile(ProfileCategory::Shared, Address::new("US", "NY"));
    let order = store.insert_order(&order_type(), Some(shared));
    store.insert_shipment(order, Some(shared));

    let report = BatchExecutor::new(&store, ExecutorConfig::default())
        .migrate(&[order], &single_ctx())
        .await;

    assert_eq!(report.succeeded, vec![order]);
    assert_eq!(store.writes(), 0);
    assert_eq!(store.profiles().len(), 1);
}

#[tokio::test]
async fn test_plan_serializes_actions_as_snake_case() {
    let store = MemoryStore::new();
    let shared = store.insert_profile(ProfileCategory::Shared, Address::new("US", "NY"));
    let order = store.insert_order(&order_type(), Some(shared));
    store.insert_shipment(order, Some(shared));

    let plan = MigrationPlanner::new(&store)
        .plan_for(order, &split_ctx())
        .await
        .unwrap();
    let value = serde_json::to_value(&plan).unwrap();

    assert_eq!(value["billing"]["action"], "retype");
    assert_eq!(value["shipments"][0]["action"], "duplicate_and_repoint");
    assert_eq!(value["targets"]["shipping"], "customer_shipping");
}
