//! Order types and the context passed into every migration call.

use serde::{Deserialize, Serialize};

use super::category::ProfileMode;
use super::machine_name::MachineName;

/// Machine name of an order type (e.g. `default`).
pub type OrderTypeId = MachineName;

/// An order type's stored configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderType {
    pub id: OrderTypeId,
    pub label: String,
    pub profile_mode: ProfileMode,
}

impl OrderType {
    /// Context value for migration calls that reflects the stored mode.
    #[must_use]
    pub fn context(&self) -> OrderTypeContext {
        OrderTypeContext {
            order_type: self.id.clone(),
            profile_mode: self.profile_mode,
        }
    }
}

/// Explicit order-type state handed to the registry, planner and executor.
///
/// The mode flag is read from here rather than from ambient configuration, so
/// a migration run can target split categories before the stored flag flips.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderTypeContext {
    pub order_type: OrderTypeId,
    pub profile_mode: ProfileMode,
}

impl OrderTypeContext {
    /// Create a context.
    #[must_use]
    pub const fn new(order_type: OrderTypeId, profile_mode: ProfileMode) -> Self {
        Self {
            order_type,
            profile_mode,
        }
    }

    /// The same order type, targeting split categories.
    #[must_use]
    pub fn targeting_split(&self) -> Self {
        Self {
            order_type: self.order_type.clone(),
            profile_mode: ProfileMode::Split,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_targeting_split_keeps_order_type() {
        let ctx = OrderTypeContext::new(MachineName::parse("default").unwrap(), ProfileMode::Single);
        let split = ctx.targeting_split();
        assert_eq!(split.order_type, ctx.order_type);
        assert_eq!(split.profile_mode, ProfileMode::Split);
    }
}
