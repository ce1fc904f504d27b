//! Order Profiles Core - Shared domain types.
//!
//! This crate provides the types used across the order profile components:
//! - `migrator` - Registry, planner, resolver, executor and provisioner
//! - `cli` - Command-line tools for provisioning and running migrations
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access. Storage
//! traits and their adapters live in the migrator crate.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, machine names, profile categories, addresses,
//!   order/shipment/profile records and category definitions

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
