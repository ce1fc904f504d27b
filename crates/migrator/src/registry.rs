//! Profile type registry.
//!
//! Resolves which category an order type's billing and shipping profiles
//! should carry. In single-profile mode both resolve to the shared category,
//! so every retype the planner considers is a no-op.

use serde::Serialize;

use order_profiles_core::{OrderTypeContext, ProfileCategory, ProfileMode};

/// Target categories for an order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfileTargets {
    pub billing: ProfileCategory,
    pub shipping: ProfileCategory,
}

impl ProfileTargets {
    /// Whether billing and shipping must live in separate records.
    #[must_use]
    pub fn is_split(self) -> bool {
        self.billing != self.shipping
    }
}

/// Resolve target categories from the order type's mode flag.
#[must_use]
pub const fn resolve(ctx: &OrderTypeContext) -> ProfileTargets {
    match ctx.profile_mode {
        ProfileMode::Single => ProfileTargets {
            billing: ProfileCategory::Shared,
            shipping: ProfileCategory::Shared,
        },
        ProfileMode::Split => ProfileTargets {
            billing: ProfileCategory::Billing,
            shipping: ProfileCategory::Shipping,
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use order_profiles_core::OrderTypeId;

    use super::*;

    fn ctx(mode: ProfileMode) -> OrderTypeContext {
        OrderTypeContext::new(OrderTypeId::parse("default").unwrap(), mode)
    }

    #[test]
    fn test_single_mode_resolves_to_shared() {
        let targets = resolve(&ctx(ProfileMode::Single));
        assert_eq!(targets.billing, ProfileCategory::Shared);
        assert_eq!(targets.shipping, ProfileCategory::Shared);
        assert!(!targets.is_split());
    }

    #[test]
    fn test_split_mode_resolves_to_billing_and_shipping() {
        let targets = resolve(&ctx(ProfileMode::Split));
        assert_eq!(targets.billing, ProfileCategory::Billing);
        assert_eq!(targets.shipping, ProfileCategory::Shipping);
        assert!(targets.is_split());
    }
}
