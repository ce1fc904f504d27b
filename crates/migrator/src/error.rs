//! Error taxonomy for provisioning, planning, repointing and the mode switch.
//!
//! - [`ProvisionError`] is fatal and raised before any order is touched.
//! - [`PlanError`] fails a single order; the batch carries on.
//! - [`ResolverError`] is reported against the order whose fan-out triggered it.
//! - [`TransitionError`] wraps everything the top-level switch can hit.

use std::fmt;

use thiserror::Error;

use order_profiles_core::{
    DisplayKind, MachineName, ModeError, OrderId, OrderTypeId, ProfileCategory, ProfileId,
    ShipmentId,
};

use crate::executor::MigrationReport;
use crate::store::StoreError;

/// A record named in an error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordRef {
    Order(OrderId),
    Profile(ProfileId),
    Shipment(ShipmentId),
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Order(id) => write!(f, "order {id}"),
            Self::Profile(id) => write!(f, "profile {id}"),
            Self::Shipment(id) => write!(f, "shipment {id}"),
        }
    }
}

/// Creating the billing/shipping categories failed.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// There is nothing to clone from.
    #[error("shared profile category `customer` does not exist")]
    SharedCategoryMissing,

    #[error("failed to create category {category}: {source}")]
    CreateCategory {
        category: ProfileCategory,
        #[source]
        source: StoreError,
    },

    #[error("failed to clone field {field} onto {category}: {source}")]
    CloneField {
        category: ProfileCategory,
        field: MachineName,
        #[source]
        source: StoreError,
    },

    #[error("failed to clone {kind} display {mode:?} onto {category}: {source}")]
    CloneDisplay {
        category: ProfileCategory,
        kind: DisplayKind,
        mode: String,
        #[source]
        source: StoreError,
    },

    /// Reading definitions failed.
    #[error("failed to read profile definitions: {0}")]
    Read(#[from] StoreError),
}

/// Repointing shipments away from a superseded profile failed.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("failed to scan shipments referencing profile {original}: {source}")]
    Scan {
        original: ProfileId,
        #[source]
        source: StoreError,
    },

    #[error(
        "failed to repoint shipment {shipment} from profile {original} to {replacement}: {source}"
    )]
    Repoint {
        shipment: ShipmentId,
        original: ProfileId,
        replacement: ProfileId,
        #[source]
        source: StoreError,
    },
}

/// Planning or applying one order's migration failed.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("order {0} does not exist")]
    OrderNotFound(OrderId),

    #[error("order {order_id} lists shipment {shipment_id}, which does not exist")]
    ShipmentNotFound {
        order_id: OrderId,
        shipment_id: ShipmentId,
    },

    /// A record vanished between planning and applying.
    #[error("{0} disappeared while the plan was applied")]
    Vanished(RecordRef),

    #[error("failed to load {record}: {source}")]
    Load {
        record: RecordRef,
        #[source]
        source: StoreError,
    },

    #[error("failed to save {record}: {source}")]
    Save {
        record: RecordRef,
        #[source]
        source: StoreError,
    },

    #[error("failed to duplicate profile {profile}: {source}")]
    Duplicate {
        profile: ProfileId,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Resolver(#[from] ResolverError),
}

impl PlanError {
    pub(crate) fn load(record: RecordRef) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Load { record, source }
    }

    pub(crate) fn save(record: RecordRef) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Save { record, source }
    }
}

/// Switching an order type to split profiles failed.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("order type {0} does not exist")]
    UnknownOrderType(OrderTypeId),

    #[error("order type {0} already uses split profiles")]
    AlreadySplit(OrderTypeId),

    #[error(transparent)]
    Mode(#[from] ModeError),

    /// Another migration run holds the dataset lock.
    #[error("another profile migration is already running")]
    Busy,

    #[error("provisioning failed: {0}")]
    Provision(#[from] ProvisionError),

    /// Some orders failed and a partial run was not accepted.
    #[error(
        "{} of {} orders failed to migrate; profile mode left unchanged",
        .0.failed.len(),
        .0.total()
    )]
    Incomplete(Box<MigrationReport>),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_error_display() {
        let err = PlanError::ShipmentNotFound {
            order_id: OrderId::new(3),
            shipment_id: ShipmentId::new(8),
        };
        assert_eq!(
            err.to_string(),
            "order 3 lists shipment 8, which does not exist"
        );

        let err = PlanError::save(RecordRef::Profile(ProfileId::new(4)))(StoreError::NotFound(
            "profile 4".to_owned(),
        ));
        assert_eq!(
            err.to_string(),
            "failed to save profile 4: not found: profile 4"
        );
    }

    #[test]
    fn test_resolver_error_is_transparent_in_plan_error() {
        let err: PlanError = ResolverError::Scan {
            original: ProfileId::new(1),
            source: StoreError::Unavailable("down".to_owned()),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "failed to scan shipments referencing profile 1: store unavailable: down"
        );
    }
}
