//! Order Profiles Migrator - split billing/shipping profile migration.
//!
//! Moves an order type from one shared customer profile category to separate
//! billing and shipping categories without losing data or leaving shipments
//! pointing at a profile they should no longer share.
//!
//! # Components
//!
//! - [`registry`] - Target categories per order type mode
//! - [`planner`] - Per-order plan and apply (retype vs duplicate-and-repoint)
//! - [`resolver`] - Dataset-wide shipment repointing after a duplication
//! - [`executor`] - Chunked batch runs with per-order failure isolation
//! - [`provisioner`] - Clones the shared category into billing and shipping
//! - [`transition`] - The one-way switch from single to split mode
//! - [`store`] - Storage traits with in-memory and `PostgreSQL` adapters
//!
//! # Example
//!
//! ```no_run
//! use order_profiles_migrator::{MemoryStore, TransitionOptions, enable_split_profiles};
//! use order_profiles_core::OrderTypeId;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! let order_type = OrderTypeId::parse("default")?;
//! let report = enable_split_profiles(&store, &order_type, TransitionOptions::default()).await?;
//! println!("{} orders migrated", report.migration.succeeded.len());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod executor;
pub mod planner;
pub mod provisioner;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod transition;

pub use config::{ConfigError, MigratorConfig};
pub use error::{PlanError, ProvisionError, RecordRef, ResolverError, TransitionError};
pub use executor::{
    BatchExecutor, DEFAULT_CHUNK_SIZE, ExecutorConfig, FailedOrder, MigrationCounters,
    MigrationReport,
};
pub use planner::{
    BillingStep, Duplication, MigrationPlan, MigrationPlanner, PlanOutcome, ProfileAction,
    ShipmentStep,
};
pub use provisioner::{ProvisionOutcome, Provisioner};
pub use registry::ProfileTargets;
pub use resolver::ReferenceResolver;
pub use store::{
    CategoryStore, FailPoint, MemoryStore, MigrationStore, OrderStore, OrderTypeStore, PgStore,
    ProfileStore, RecordStore, RunLock, ShipmentStore, StoreError,
};
pub use transition::{
    MigrationRun, TransitionOptions, TransitionPreview, TransitionReport, describe,
    enable_split_profiles, enable_split_profiles_with_cancel, migrate_orders_with_cancel,
};
