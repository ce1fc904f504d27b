//! The one-way switch from shared to split profiles.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::AtomicBool;

use order_profiles_core::{ModeError, ProfileCategory, ProfileMode};
use order_profiles_integration_tests::{address, assert_split_invariants, configured_store, order_type};
use order_profiles_migrator::{
    ExecutorConfig, FailPoint, RunLock, TransitionError, TransitionOptions, describe,
    enable_split_profiles, enable_split_profiles_with_cancel,
};

#[tokio::test]
async fn test_full_switch() {
    let store = configured_store();
    let shared = store.insert_profile(ProfileCategory::Shared, address("US", "NY", "1 Main St"));
    let order = store.insert_order(&order_type(), Some(shared));
    store.insert_shipment(order, Some(shared));

    let preview = describe(&store, &order_type()).await.unwrap();
    assert_eq!(preview.order_count, 1);

    let report = enable_split_profiles(&store, &order_type(), TransitionOptions::default())
        .await
        .unwrap();

    assert_eq!(report.provision.created.len(), 2);
    assert_eq!(report.migration.succeeded, vec![order]);
    assert_eq!(
        store.order_type(&order_type()).unwrap().profile_mode,
        ProfileMode::Split
    );
    assert_split_invariants(&store, &[order]);
    assert!(!store.is_locked());
}

#[tokio::test]
async fn test_incomplete_run_keeps_single_mode() {
    let store = configured_store();
    let shared = store.insert_profile(ProfileCategory::Shared, address("US", "NY", "1 Main St"));
    let order = store.insert_order(&order_type(), Some(shared));
    store.insert_shipment(order, Some(shared));
    store.fail_on(FailPoint::DuplicateProfile(shared));

    let err = enable_split_profiles(&store, &order_type(), TransitionOptions::default())
        .await
        .unwrap_err();

    let TransitionError::Incomplete(report) = err else {
        panic!("expected an incomplete run, got {err}");
    };
    assert_eq!(report.failed_ids(), vec![order]);
    assert_eq!(
        store.order_type(&order_type()).unwrap().profile_mode,
        ProfileMode::Single
    );
    assert!(!store.is_locked());

    store.clear_failures();
    enable_split_profiles(&store, &order_type(), TransitionOptions::default())
        .await
        .unwrap();
    assert_split_invariants(&store, &[order]);
}

#[tokio::test]
async fn test_accept_partial_switches_anyway() {
    let store = configured_store();
    let shared = store.insert_profile(ProfileCategory::Shared, address("US", "NY", "1 Main St"));
    let order = store.insert_order(&order_type(), Some(shared));
    store.insert_shipment(order, Some(shared));
    store.fail_on(FailPoint::DuplicateProfile(shared));

    let options = TransitionOptions {
        accept_partial: true,
        executor: ExecutorConfig::default(),
    };
    let report = enable_split_profiles(&store, &order_type(), options)
        .await
        .unwrap();

    assert_eq!(report.migration.failed.len(), 1);
    assert_eq!(report.profile_mode, ProfileMode::Split);
}

#[tokio::test]
async fn test_cancelled_switch_never_flips_the_flag() {
    let store = configured_store();
    store.insert_order(&order_type(), None);
    let options = TransitionOptions {
        accept_partial: true,
        executor: ExecutorConfig::default(),
    };

    let err = enable_split_profiles_with_cancel(&store, &order_type(), options, &AtomicBool::new(true))
        .await
        .unwrap_err();

    assert!(matches!(err, TransitionError::Incomplete(ref report) if report.cancelled));
    assert_eq!(
        store.order_type(&order_type()).unwrap().profile_mode,
        ProfileMode::Single
    );
}

#[tokio::test]
async fn test_concurrent_run_is_rejected() {
    let store = configured_store();
    assert!(store.try_acquire().await.unwrap());

    let err = enable_split_profiles(&store, &order_type(), TransitionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::Busy));

    store.release().await.unwrap();
    enable_split_profiles(&store, &order_type(), TransitionOptions::default())
        .await
        .unwrap();
}

#[test]
fn test_split_to_single_is_rejected() {
    let err = ProfileMode::Split
        .transition_to(ProfileMode::Single)
        .unwrap_err();
    assert_eq!(
        err,
        ModeError::Irreversible {
            from: ProfileMode::Split,
            to: ProfileMode::Single,
        }
    );
}

#[tokio::test]
async fn test_switching_twice_is_rejected() {
    let store = configured_store();
    enable_split_profiles(&store, &order_type(), TransitionOptions::default())
        .await
        .unwrap();

    let err = enable_split_profiles(&store, &order_type(), TransitionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::AlreadySplit(_)));
}
