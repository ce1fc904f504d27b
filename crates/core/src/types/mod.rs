//! Core types for order profiles.
//!
//! This module provides type-safe wrappers for the domain concepts touched by
//! the split-profile migration.

pub mod address;
pub mod category;
pub mod definition;
pub mod entity;
pub mod id;
pub mod machine_name;
pub mod order_type;

pub use address::Address;
pub use category::{ModeError, ProfileCategory, ProfileMode};
pub use definition::{
    CategoryDefinition, DisplayComponent, DisplayKind, EntityDisplay, FieldDefinition,
};
pub use entity::{Order, Profile, Shipment};
pub use id::*;
pub use machine_name::{MachineName, MachineNameError};
pub use order_type::{OrderType, OrderTypeContext, OrderTypeId};
