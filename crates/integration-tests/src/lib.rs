//! Integration tests for the split billing/shipping profile migration.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p order-profiles-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `scenarios` - Single-order scenarios and the distinct-identity no-op
//! - `fan_out` - Profiles shared across orders, in every processing order
//! - `batch` - Idempotence, failure isolation and cancellation
//! - `provisioning` - Category cloning fidelity and idempotence
//! - `transition` - The one-way switch to split profiles
//!
//! Every test runs against [`MemoryStore`]; no database is needed.

use order_profiles_core::{
    Address, CategoryDefinition, DisplayComponent, DisplayKind, EntityDisplay, FieldDefinition,
    MachineName, OrderId, OrderTypeContext, OrderTypeId, ProfileCategory, ProfileMode,
};
use order_profiles_migrator::MemoryStore;
use serde_json::json;

/// Machine name of the order type every fixture uses.
pub const ORDER_TYPE: &str = "default";

/// The fixture order type id.
///
/// # Panics
///
/// Never; `default` is a valid machine name.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn order_type() -> OrderTypeId {
    OrderTypeId::parse(ORDER_TYPE).unwrap()
}

/// Context targeting split categories.
#[must_use]
pub fn split_ctx() -> OrderTypeContext {
    OrderTypeContext::new(order_type(), ProfileMode::Split)
}

/// Context for an order type still in single mode.
#[must_use]
pub fn single_ctx() -> OrderTypeContext {
    OrderTypeContext::new(order_type(), ProfileMode::Single)
}

/// An address with a country, area and first line.
#[must_use]
pub fn address(country: &str, area: &str, line1: &str) -> Address {
    Address::new(country, area).with_line1(line1)
}

/// A store with the fixture order type in single mode and a configured
/// shared category: three fields (one base) and a view and form display.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn configured_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert_order_type(order_type(), "Default", ProfileMode::Single);
    store.insert_category(CategoryDefinition {
        category: ProfileCategory::Shared,
        label: "Customer".to_owned(),
    });

    for (name, base) in [("address", true), ("phone", false), ("tax_number", false)] {
        store.insert_field(FieldDefinition {
            category: ProfileCategory::Shared,
            name: MachineName::parse(name).unwrap(),
            field_type: if base { "address" } else { "string" }.to_owned(),
            base,
            required: base,
            settings: json!({ "max_length": 255 }),
        });
    }

    for kind in DisplayKind::ALL {
        store.insert_display(EntityDisplay {
            category: ProfileCategory::Shared,
            kind,
            mode: "default".to_owned(),
            enabled: true,
            components: ["tax_number", "address", "phone"]
                .into_iter()
                .enumerate()
                .map(|(weight, name)| DisplayComponent {
                    name: name.to_owned(),
                    settings: json!({ "weight": weight, "kind": kind.to_string() }),
                })
                .collect(),
        });
    }

    store
}

/// Every shipment in the store must reference a profile that exists, and no
/// shipment may share a profile with any order's billing reference.
///
/// # Panics
///
/// Panics with a description of the first violation found.
pub fn assert_split_invariants(store: &MemoryStore, orders: &[OrderId]) {
    let billing: Vec<_> = orders
        .iter()
        .filter_map(|id| store.order(*id))
        .filter_map(|o| o.billing_profile)
        .collect();

    for order_id in orders {
        let Some(order) = store.order(*order_id) else {
            panic!("order {order_id} vanished");
        };
        for shipment_id in &order.shipments {
            let Some(shipment) = store.shipment(*shipment_id) else {
                panic!("shipment {shipment_id} vanished");
            };
            let Some(profile_id) = shipment.shipping_profile else {
                continue;
            };
            let Some(profile) = store.profile(profile_id) else {
                panic!("shipment {shipment_id} references missing profile {profile_id}");
            };
            assert!(
                !billing.contains(&profile_id),
                "shipment {shipment_id} still shares billing profile {profile_id}"
            );
            assert_eq!(
                profile.category,
                ProfileCategory::Shipping,
                "shipment {shipment_id} profile {profile_id} has wrong category"
            );
        }
    }
}
