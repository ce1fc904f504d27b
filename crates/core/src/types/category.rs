//! Profile categories and the per-order-type profile mode.

use serde::{Deserialize, Serialize};

/// The category (bundle) of a customer profile.
///
/// Before the split every customer profile is `Shared`. After the split an
/// order's billing profile is `Billing` and every shipment's profile is
/// `Shipping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProfileCategory {
    /// Used interchangeably for billing and shipping.
    #[serde(rename = "customer")]
    Shared,
    /// Billing-only profile.
    #[serde(rename = "customer_billing")]
    Billing,
    /// Shipping-only profile.
    #[serde(rename = "customer_shipping")]
    Shipping,
}

impl ProfileCategory {
    /// All categories, shared first.
    pub const ALL: [Self; 3] = [Self::Shared, Self::Billing, Self::Shipping];

    /// The two categories created when an order type switches to split mode.
    pub const SPLIT: [Self; 2] = [Self::Billing, Self::Shipping];

    /// Storage machine name of the category.
    #[must_use]
    pub const fn machine_name(self) -> &'static str {
        match self {
            Self::Shared => "customer",
            Self::Billing => "customer_billing",
            Self::Shipping => "customer_shipping",
        }
    }

    /// Human readable label, as shown in the category listing.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Shared => "Customer",
            Self::Billing => "Customer Billing",
            Self::Shipping => "Customer Shipping",
        }
    }
}

impl std::fmt::Display for ProfileCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.machine_name())
    }
}

impl std::str::FromStr for ProfileCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Shared),
            "customer_billing" => Ok(Self::Billing),
            "customer_shipping" => Ok(Self::Shipping),
            _ => Err(format!("invalid profile category: {s}")),
        }
    }
}

/// Errors raised by [`ProfileMode::transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ModeError {
    /// Split mode is terminal.
    #[error("cannot switch from {from} back to {to} profile mode")]
    Irreversible {
        /// Current mode.
        from: ProfileMode,
        /// Requested mode.
        to: ProfileMode,
    },
}

/// Whether an order type tracks billing and shipping as one profile category
/// or two.
///
/// `Single` -> `Split` is the only transition; `Split` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProfileMode {
    /// One shared category for billing and shipping.
    #[default]
    Single,
    /// Distinct billing and shipping categories.
    Split,
}

impl ProfileMode {
    /// Whether split categories are in use.
    #[must_use]
    pub const fn is_split(self) -> bool {
        matches!(self, Self::Split)
    }

    /// Validate a mode change and return the resulting mode.
    ///
    /// Setting the current mode again is allowed and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ModeError::Irreversible`] when asked to leave `Split`.
    pub const fn transition_to(self, next: Self) -> Result<Self, ModeError> {
        match (self, next) {
            (Self::Split, Self::Single) => Err(ModeError::Irreversible {
                from: self,
                to: next,
            }),
            _ => Ok(next),
        }
    }
}

impl std::fmt::Display for ProfileMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Split => write!(f, "split"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_names_round_trip_through_from_str() {
        for category in ProfileCategory::ALL {
            let parsed: ProfileCategory = category.machine_name().parse().unwrap();
            assert_eq!(parsed, category);
        }
        assert!("profile".parse::<ProfileCategory>().is_err());
    }

    #[test]
    fn test_category_serializes_as_machine_name() {
        let json = serde_json::to_string(&ProfileCategory::Shipping).unwrap();
        assert_eq!(json, "\"customer_shipping\"");
    }

    #[test]
    fn test_labels() {
        assert_eq!(ProfileCategory::Billing.label(), "Customer Billing");
        assert_eq!(ProfileCategory::Shipping.label(), "Customer Shipping");
    }

    #[test]
    fn test_single_to_split_allowed() {
        assert_eq!(
            ProfileMode::Single.transition_to(ProfileMode::Split),
            Ok(ProfileMode::Split)
        );
        assert_eq!(
            ProfileMode::Split.transition_to(ProfileMode::Split),
            Ok(ProfileMode::Split)
        );
    }

    #[test]
    fn test_split_is_terminal() {
        let err = ProfileMode::Split
            .transition_to(ProfileMode::Single)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot switch from split back to single profile mode"
        );
    }
}
