//! Persistence abstraction consumed by the migration.
//!
//! The migration never talks to a database directly. It reads and writes
//! through these traits, which are implemented by:
//!
//! - [`memory::MemoryStore`] - in-process store for tests and dry runs
//! - [`postgres::PgStore`] - `PostgreSQL` store used by the CLI
//!
//! # Tables (`PostgreSQL`)
//!
//! - `commerce.order_type` - order types and their profile mode flag
//! - `commerce.orders` - orders with their billing profile reference
//! - `commerce.shipment` - shipments with their shipping profile reference
//! - `commerce.profile` - customer profiles (category, address JSONB and the
//!   profile a split-off copy came from)
//! - `commerce.profile_category` - profile categories
//! - `commerce.profile_field` - configurable fields per category
//! - `commerce.profile_display` - view/form layouts per category
//!
//! Migrations live in `crates/migrator/migrations/` and run via:
//! ```bash
//! cargo run -p order-profiles-cli -- db migrate
//! ```

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use order_profiles_core::{
    CategoryDefinition, DisplayKind, EntityDisplay, FieldDefinition, Order, OrderId, OrderType,
    OrderTypeId, Profile, ProfileCategory, ProfileId, ProfileMode, Shipment, ShipmentId,
};

pub use memory::{FailPoint, MemoryStore};
pub use postgres::PgStore;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The record to update does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Constraint violation (e.g., category already exists).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The store refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Load, save and duplicate customer profiles.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Load a profile by id.
    async fn load_profile(&self, id: ProfileId) -> Result<Option<Profile>, StoreError>;

    /// Persist a profile's category and address.
    async fn save_profile(&self, profile: &Profile) -> Result<(), StoreError>;

    /// Create a copy of `source` with a fresh identity and the given category.
    ///
    /// The copy records `source` as the profile it was duplicated from.
    async fn create_duplicate(
        &self,
        source: &Profile,
        category: ProfileCategory,
    ) -> Result<Profile, StoreError>;

    /// The earliest copy of `original` in `category`, if one was created.
    async fn find_duplicate_of(
        &self,
        original: ProfileId,
        category: ProfileCategory,
    ) -> Result<Option<Profile>, StoreError>;
}

/// Load, save and search shipments.
#[async_trait]
pub trait ShipmentStore: Send + Sync {
    /// Load a shipment by id.
    async fn load_shipment(&self, id: ShipmentId) -> Result<Option<Shipment>, StoreError>;

    /// Persist a shipment's references.
    async fn save_shipment(&self, shipment: &Shipment) -> Result<(), StoreError>;

    /// Every shipment in the dataset whose shipping profile is `profile`,
    /// ordered by id.
    async fn find_shipments_by_shipping_profile(
        &self,
        profile: ProfileId,
    ) -> Result<Vec<Shipment>, StoreError>;
}

/// Load and enumerate orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Load an order by id.
    async fn load_order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// All order ids of an order type, ascending.
    async fn find_order_ids_by_type(
        &self,
        order_type: &OrderTypeId,
    ) -> Result<Vec<OrderId>, StoreError>;

    /// All orders whose billing profile is `profile`, ascending.
    async fn find_order_ids_by_billing_profile(
        &self,
        profile: ProfileId,
    ) -> Result<Vec<OrderId>, StoreError>;
}

/// Profile category, field and display definitions.
#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn load_category(
        &self,
        category: ProfileCategory,
    ) -> Result<Option<CategoryDefinition>, StoreError>;

    /// Create a category. Fails with [`StoreError::Conflict`] if it exists.
    async fn create_category(&self, definition: &CategoryDefinition) -> Result<(), StoreError>;

    /// Fields of a category, base fields included, in definition order.
    async fn field_definitions(
        &self,
        category: ProfileCategory,
    ) -> Result<Vec<FieldDefinition>, StoreError>;

    /// Insert or update a field definition.
    async fn save_field_definition(&self, field: &FieldDefinition) -> Result<(), StoreError>;

    /// Every view and form display of a category.
    async fn displays(&self, category: ProfileCategory) -> Result<Vec<EntityDisplay>, StoreError>;

    async fn load_display(
        &self,
        category: ProfileCategory,
        kind: DisplayKind,
        mode: &str,
    ) -> Result<Option<EntityDisplay>, StoreError>;

    /// Insert or update a display, replacing its components.
    async fn save_display(&self, display: &EntityDisplay) -> Result<(), StoreError>;
}

/// Order type configuration, including the profile mode flag.
#[async_trait]
pub trait OrderTypeStore: Send + Sync {
    async fn load_order_type(&self, id: &OrderTypeId) -> Result<Option<OrderType>, StoreError>;

    async fn save_profile_mode(
        &self,
        id: &OrderTypeId,
        mode: ProfileMode,
    ) -> Result<(), StoreError>;
}

/// Dataset-wide single-flight lock for migration runs.
#[async_trait]
pub trait RunLock: Send + Sync {
    /// Try to take the lock. Returns `false` if another run holds it.
    async fn try_acquire(&self) -> Result<bool, StoreError>;

    /// Release the lock. Releasing a lock that is not held is a no-op.
    async fn release(&self) -> Result<(), StoreError>;
}

/// The record stores the planner, resolver and executor work against.
pub trait RecordStore: ProfileStore + ShipmentStore + OrderStore {}

impl<T: ProfileStore + ShipmentStore + OrderStore> RecordStore for T {}

/// Everything the mode transition needs.
pub trait MigrationStore: RecordStore + CategoryStore + OrderTypeStore + RunLock {}

impl<T: RecordStore + CategoryStore + OrderTypeStore + RunLock> MigrationStore for T {}
