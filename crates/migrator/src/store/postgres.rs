//! `PostgreSQL` store.
//!
//! Queries are runtime-checked (`query_as` + `FromRow`) so the crate builds
//! without a live database. Row types convert into domain types through
//! `TryFrom`, surfacing bad stored values as [`StoreError::DataCorruption`].

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use order_profiles_core::{
    Address, CategoryDefinition, DisplayComponent, DisplayKind, EntityDisplay, FieldDefinition,
    MachineName, Order, OrderId, OrderType, OrderTypeId, Profile, ProfileCategory, ProfileId,
    ProfileMode, Shipment, ShipmentId,
};

use super::{
    CategoryStore, OrderStore, OrderTypeStore, ProfileStore, RunLock, ShipmentStore, StoreError,
};

/// Create a `PostgreSQL` connection pool.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &SecretString,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply the schema migrations in `crates/migrator/migrations/`.
///
/// # Errors
///
/// Returns an error if a migration fails to apply.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

fn parse_category(value: &str) -> Result<ProfileCategory, StoreError> {
    value.parse().map_err(StoreError::DataCorruption)
}

fn parse_name(value: &str) -> Result<MachineName, StoreError> {
    MachineName::parse(value)
        .map_err(|e| StoreError::DataCorruption(format!("invalid machine name {value:?}: {e}")))
}

fn parse_mode(value: &str) -> Result<ProfileMode, StoreError> {
    match value {
        "single" => Ok(ProfileMode::Single),
        "split" => Ok(ProfileMode::Split),
        other => Err(StoreError::DataCorruption(format!(
            "invalid profile mode: {other}"
        ))),
    }
}

fn not_found_unless_updated(
    result: &sqlx::postgres::PgQueryResult,
    what: impl FnOnce() -> String,
) -> Result<(), StoreError> {
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(what()));
    }
    Ok(())
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: i32,
    category: String,
    address: JsonValue,
    duplicated_from: Option<i32>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = StoreError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let address: Address = serde_json::from_value(row.address).map_err(|e| {
            StoreError::DataCorruption(format!("invalid address on profile {}: {e}", row.id))
        })?;

        Ok(Self {
            id: ProfileId::new(row.id),
            category: parse_category(&row.category)?,
            address,
            duplicated_from: row.duplicated_from.map(ProfileId::new),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ShipmentRow {
    id: i32,
    order_id: i32,
    shipping_profile_id: Option<i32>,
}

impl From<ShipmentRow> for Shipment {
    fn from(row: ShipmentRow) -> Self {
        Self {
            id: ShipmentId::new(row.id),
            order_id: OrderId::new(row.order_id),
            shipping_profile: row.shipping_profile_id.map(ProfileId::new),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    order_type: String,
    billing_profile_id: Option<i32>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderTypeRow {
    id: String,
    label: String,
    profile_mode: String,
}

impl TryFrom<OrderTypeRow> for OrderType {
    type Error = StoreError;

    fn try_from(row: OrderTypeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_name(&row.id)?,
            label: row.label,
            profile_mode: parse_mode(&row.profile_mode)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: String,
    label: String,
}

impl TryFrom<CategoryRow> for CategoryDefinition {
    type Error = StoreError;

    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            category: parse_category(&row.id)?,
            label: row.label,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FieldRow {
    category: String,
    name: String,
    field_type: String,
    is_base: bool,
    required: bool,
    settings: JsonValue,
}

impl TryFrom<FieldRow> for FieldDefinition {
    type Error = StoreError;

    fn try_from(row: FieldRow) -> Result<Self, Self::Error> {
        Ok(Self {
            category: parse_category(&row.category)?,
            name: parse_name(&row.name)?,
            field_type: row.field_type,
            base: row.is_base,
            required: row.required,
            settings: row.settings,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DisplayRow {
    category: String,
    kind: String,
    mode: String,
    enabled: bool,
    components: JsonValue,
}

impl TryFrom<DisplayRow> for EntityDisplay {
    type Error = StoreError;

    fn try_from(row: DisplayRow) -> Result<Self, Self::Error> {
        let components: Vec<DisplayComponent> = serde_json::from_value(row.components)
            .map_err(|e| {
                StoreError::DataCorruption(format!(
                    "invalid components on {} display {}.{}: {e}",
                    row.kind, row.category, row.mode
                ))
            })?;

        Ok(Self {
            category: parse_category(&row.category)?,
            kind: row.kind.parse().map_err(StoreError::DataCorruption)?,
            mode: row.mode,
            enabled: row.enabled,
            components,
        })
    }
}

// =============================================================================
// Store
// =============================================================================

/// Store backed by a `PostgreSQL` pool.
///
/// The run lock is a session-level advisory lock, so the connection that took
/// it is parked here until [`RunLock::release`].
pub struct PgStore {
    pool: PgPool,
    lock_key: i64,
    lock_conn: Mutex<Option<PoolConnection<Postgres>>>,
}

impl PgStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool, lock_key: i64) -> Self {
        Self {
            pool,
            lock_key,
            lock_conn: Mutex::new(None),
        }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_shipment_ids(&self, order_id: i32) -> Result<Vec<ShipmentId>, StoreError> {
        let ids: Vec<i32> = sqlx::query_scalar(
            r"
            SELECT id FROM commerce.shipment
            WHERE order_id = $1
            ORDER BY position, id
            ",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(ShipmentId::new).collect())
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn load_profile(&self, id: ProfileId) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r"
            SELECT id, category, address, duplicated_from
            FROM commerce.profile
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn save_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        let address = serde_json::to_value(&profile.address)
            .map_err(|e| StoreError::DataCorruption(format!("unserializable address: {e}")))?;

        let result = sqlx::query(
            r"
            UPDATE commerce.profile
            SET category = $2, address = $3, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(profile.id)
        .bind(profile.category.machine_name())
        .bind(address)
        .execute(&self.pool)
        .await?;

        not_found_unless_updated(&result, || format!("profile {}", profile.id))
    }

    async fn create_duplicate(
        &self,
        source: &Profile,
        category: ProfileCategory,
    ) -> Result<Profile, StoreError> {
        let address = serde_json::to_value(&source.address)
            .map_err(|e| StoreError::DataCorruption(format!("unserializable address: {e}")))?;

        let row = sqlx::query_as::<_, ProfileRow>(
            r"
            INSERT INTO commerce.profile (category, address, duplicated_from)
            VALUES ($1, $2, $3)
            RETURNING id, category, address, duplicated_from
            ",
        )
        .bind(category.machine_name())
        .bind(address)
        .bind(source.id)
        .fetch_one(&self.pool)
        .await?;

        debug!(source = %source.id, duplicate = row.id, "Inserted duplicate profile");
        row.try_into()
    }

    async fn find_duplicate_of(
        &self,
        original: ProfileId,
        category: ProfileCategory,
    ) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r"
            SELECT id, category, address, duplicated_from
            FROM commerce.profile
            WHERE duplicated_from = $1 AND category = $2
            ORDER BY id
            LIMIT 1
            ",
        )
        .bind(original)
        .bind(category.machine_name())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}

#[async_trait]
impl ShipmentStore for PgStore {
    async fn load_shipment(&self, id: ShipmentId) -> Result<Option<Shipment>, StoreError> {
        let row = sqlx::query_as::<_, ShipmentRow>(
            r"
            SELECT id, order_id, shipping_profile_id
            FROM commerce.shipment
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn save_shipment(&self, shipment: &Shipment) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            UPDATE commerce.shipment
            SET order_id = $2, shipping_profile_id = $3, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(shipment.id)
        .bind(shipment.order_id)
        .bind(shipment.shipping_profile)
        .execute(&self.pool)
        .await?;

        not_found_unless_updated(&result, || format!("shipment {}", shipment.id))
    }

    async fn find_shipments_by_shipping_profile(
        &self,
        profile: ProfileId,
    ) -> Result<Vec<Shipment>, StoreError> {
        let rows = sqlx::query_as::<_, ShipmentRow>(
            r"
            SELECT id, order_id, shipping_profile_id
            FROM commerce.shipment
            WHERE shipping_profile_id = $1
            ORDER BY id
            ",
        )
        .bind(profile)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn load_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let Some(row) = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, order_type, billing_profile_id
            FROM commerce.orders
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let shipments = self.load_shipment_ids(row.id).await?;

        Ok(Some(Order {
            id: OrderId::new(row.id),
            order_type: parse_name(&row.order_type)?,
            billing_profile: row.billing_profile_id.map(ProfileId::new),
            shipments,
        }))
    }

    async fn find_order_ids_by_type(
        &self,
        order_type: &OrderTypeId,
    ) -> Result<Vec<OrderId>, StoreError> {
        let ids: Vec<i32> = sqlx::query_scalar(
            r"
            SELECT id FROM commerce.orders
            WHERE order_type = $1
            ORDER BY id
            ",
        )
        .bind(order_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(OrderId::new).collect())
    }

    async fn find_order_ids_by_billing_profile(
        &self,
        profile: ProfileId,
    ) -> Result<Vec<OrderId>, StoreError> {
        let ids: Vec<i32> = sqlx::query_scalar(
            r"
            SELECT id FROM commerce.orders
            WHERE billing_profile_id = $1
            ORDER BY id
            ",
        )
        .bind(profile)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(OrderId::new).collect())
    }
}

#[async_trait]
impl CategoryStore for PgStore {
    async fn load_category(
        &self,
        category: ProfileCategory,
    ) -> Result<Option<CategoryDefinition>, StoreError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT id, label FROM commerce.profile_category
            WHERE id = $1
            ",
        )
        .bind(category.machine_name())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn create_category(&self, definition: &CategoryDefinition) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            INSERT INTO commerce.profile_category (id, label)
            VALUES ($1, $2)
            ",
        )
        .bind(definition.category.machine_name())
        .bind(&definition.label)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(StoreError::Conflict(
                format!("category {} already exists", definition.category),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn field_definitions(
        &self,
        category: ProfileCategory,
    ) -> Result<Vec<FieldDefinition>, StoreError> {
        let rows = sqlx::query_as::<_, FieldRow>(
            r"
            SELECT category, name, field_type, is_base, required, settings
            FROM commerce.profile_field
            WHERE category = $1
            ORDER BY position
            ",
        )
        .bind(category.machine_name())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn save_field_definition(&self, field: &FieldDefinition) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO commerce.profile_field
                (category, name, field_type, is_base, required, settings)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (category, name) DO UPDATE
            SET field_type = $3, is_base = $4, required = $5, settings = $6
            ",
        )
        .bind(field.category.machine_name())
        .bind(field.name.as_str())
        .bind(&field.field_type)
        .bind(field.base)
        .bind(field.required)
        .bind(&field.settings)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn displays(&self, category: ProfileCategory) -> Result<Vec<EntityDisplay>, StoreError> {
        let rows = sqlx::query_as::<_, DisplayRow>(
            r"
            SELECT category, kind, mode, enabled, components
            FROM commerce.profile_display
            WHERE category = $1
            ORDER BY kind, mode
            ",
        )
        .bind(category.machine_name())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn load_display(
        &self,
        category: ProfileCategory,
        kind: DisplayKind,
        mode: &str,
    ) -> Result<Option<EntityDisplay>, StoreError> {
        let row = sqlx::query_as::<_, DisplayRow>(
            r"
            SELECT category, kind, mode, enabled, components
            FROM commerce.profile_display
            WHERE category = $1 AND kind = $2 AND mode = $3
            ",
        )
        .bind(category.machine_name())
        .bind(kind.to_string())
        .bind(mode)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn save_display(&self, display: &EntityDisplay) -> Result<(), StoreError> {
        let components = serde_json::to_value(&display.components)
            .map_err(|e| StoreError::DataCorruption(format!("unserializable components: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO commerce.profile_display (category, kind, mode, enabled, components)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (category, kind, mode) DO UPDATE
            SET enabled = $4, components = $5
            ",
        )
        .bind(display.category.machine_name())
        .bind(display.kind.to_string())
        .bind(&display.mode)
        .bind(display.enabled)
        .bind(components)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl OrderTypeStore for PgStore {
    async fn load_order_type(&self, id: &OrderTypeId) -> Result<Option<OrderType>, StoreError> {
        let row = sqlx::query_as::<_, OrderTypeRow>(
            r"
            SELECT id, label, profile_mode
            FROM commerce.order_type
            WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn save_profile_mode(
        &self,
        id: &OrderTypeId,
        mode: ProfileMode,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            UPDATE commerce.order_type
            SET profile_mode = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .bind(mode.to_string())
        .execute(&self.pool)
        .await?;

        not_found_unless_updated(&result, || format!("order type {id}"))
    }
}

#[async_trait]
impl RunLock for PgStore {
    async fn try_acquire(&self) -> Result<bool, StoreError> {
        let mut slot = self.lock_conn.lock().await;
        if slot.is_some() {
            return Ok(false);
        }

        let mut conn = self.pool.acquire().await?;
        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(self.lock_key)
            .fetch_one(&mut *conn)
            .await?;

        if acquired {
            *slot = Some(conn);
        }
        Ok(acquired)
    }

    async fn release(&self) -> Result<(), StoreError> {
        let Some(mut conn) = self.lock_conn.lock().await.take() else {
            return Ok(());
        };

        let released: bool = match sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
            .bind(self.lock_key)
            .fetch_one(&mut *conn)
            .await
        {
            Ok(released) => released,
            Err(e) => {
                // The session may still hold the lock; never hand it back to the pool.
                conn.close_on_drop();
                return Err(e.into());
            }
        };

        if !released {
            // Closing the session drops any advisory lock it still holds.
            warn!(lock_key = self.lock_key, "Advisory lock was not held at release");
            conn.close_on_drop();
        }
        Ok(())
    }
}
