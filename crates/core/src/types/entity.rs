//! Profile, order and shipment records as seen by the migration.
//!
//! These carry only the fields the split-profile migration reads or writes.
//! Everything else about an order (items, totals, workflow state) belongs to
//! the systems that own those records.

use serde::{Deserialize, Serialize};

use super::address::Address;
use super::category::ProfileCategory;
use super::id::{OrderId, ProfileId, ShipmentId};
use super::order_type::OrderTypeId;

/// A customer profile: an address record with a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub category: ProfileCategory,
    pub address: Address,
    /// The profile this record was copied from, for split-off shipping
    /// profiles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicated_from: Option<ProfileId>,
}

impl Profile {
    /// Create a profile record.
    #[must_use]
    pub const fn new(id: ProfileId, category: ProfileCategory, address: Address) -> Self {
        Self {
            id,
            category,
            address,
            duplicated_from: None,
        }
    }

    /// A new record `id` holding a copy of `source`'s address.
    #[must_use]
    pub fn copy_of(id: ProfileId, source: &Self, category: ProfileCategory) -> Self {
        Self {
            id,
            category,
            address: source.address.clone(),
            duplicated_from: Some(source.id),
        }
    }

    /// Display label for the profile.
    ///
    /// Customer profiles of every category are labelled with their first
    /// address line. Returns `None` when that line is blank.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        let line = self.address.address_line1.trim();
        (!line.is_empty()).then_some(line)
    }
}

/// An order with its billing and shipment references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_type: OrderTypeId,
    pub billing_profile: Option<ProfileId>,
    /// Shipments in the order's own ordering.
    pub shipments: Vec<ShipmentId>,
}

/// A shipment and the profile it ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub order_id: OrderId,
    pub shipping_profile: Option<ProfileId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_uses_first_address_line() {
        let profile = Profile::new(
            ProfileId::new(1),
            ProfileCategory::Billing,
            Address::new("US", "NY").with_line1("  1098 Alta Ave "),
        );
        assert_eq!(profile.label(), Some("1098 Alta Ave"));
    }

    #[test]
    fn test_copy_keeps_address_and_records_source() {
        let source = Profile::new(
            ProfileId::new(3),
            ProfileCategory::Billing,
            Address::new("US", "NY").with_line1("1 Main St"),
        );
        let copy = Profile::copy_of(ProfileId::new(4), &source, ProfileCategory::Shipping);

        assert_eq!(copy.address, source.address);
        assert_eq!(copy.category, ProfileCategory::Shipping);
        assert_eq!(copy.duplicated_from, Some(ProfileId::new(3)));
        assert_eq!(source.duplicated_from, None);
    }

    #[test]
    fn test_label_absent_for_blank_line() {
        let profile = Profile::new(
            ProfileId::new(1),
            ProfileCategory::Shared,
            Address::new("FR", ""),
        );
        assert_eq!(profile.label(), None);
    }
}
