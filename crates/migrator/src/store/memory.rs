//! In-memory store.
//!
//! Backs the unit and integration tests and lets operators rehearse a run on a
//! snapshot. Every successful write bumps a counter so callers can assert that
//! a rerun performed no writes. Individual operations can be made to fail with
//! [`FailPoint`]s.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use order_profiles_core::{
    Address, CategoryDefinition, DisplayKind, EntityDisplay, FieldDefinition, Order, OrderId,
    OrderType, OrderTypeId, Profile, ProfileCategory, ProfileId, ProfileMode, Shipment,
    ShipmentId,
};

use super::{
    CategoryStore, OrderStore, OrderTypeStore, ProfileStore, RunLock, ShipmentStore, StoreError,
};

/// An operation that should fail on its next and all later calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailPoint {
    LoadOrder(OrderId),
    LoadProfile(ProfileId),
    SaveProfile(ProfileId),
    DuplicateProfile(ProfileId),
    FindDuplicate(ProfileId),
    LoadShipment(ShipmentId),
    SaveShipment(ShipmentId),
    FindShipments(ProfileId),
    CreateCategory(ProfileCategory),
    SaveDisplay(ProfileCategory),
}

#[derive(Debug, Default)]
struct State {
    profiles: BTreeMap<ProfileId, Profile>,
    orders: BTreeMap<OrderId, Order>,
    shipments: BTreeMap<ShipmentId, Shipment>,
    order_types: BTreeMap<OrderTypeId, OrderType>,
    categories: BTreeMap<ProfileCategory, CategoryDefinition>,
    fields: Vec<FieldDefinition>,
    displays: Vec<EntityDisplay>,
    next_profile: i32,
    next_order: i32,
    next_shipment: i32,
    writes: u64,
    locked: bool,
    fail_points: HashSet<FailPoint>,
}

impl State {
    fn check(&self, point: &FailPoint) -> Result<(), StoreError> {
        if self.fail_points.contains(point) {
            return Err(StoreError::Unavailable(format!("injected failure: {point:?}")));
        }
        Ok(())
    }

    fn allocate_profile_id(&mut self) -> ProfileId {
        self.next_profile += 1;
        ProfileId::new(self.next_profile)
    }
}

/// In-process implementation of every store trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Add an order type.
    pub fn insert_order_type(&self, id: OrderTypeId, label: &str, profile_mode: ProfileMode) {
        self.state().order_types.insert(
            id.clone(),
            OrderType {
                id,
                label: label.to_owned(),
                profile_mode,
            },
        );
    }

    /// Add a profile and return its id.
    pub fn insert_profile(&self, category: ProfileCategory, address: Address) -> ProfileId {
        let mut state = self.state();
        let id = state.allocate_profile_id();
        state
            .profiles
            .insert(id, Profile::new(id, category, address));
        id
    }

    /// Add an order with no shipments and return its id.
    pub fn insert_order(&self, order_type: &OrderTypeId, billing: Option<ProfileId>) -> OrderId {
        let mut state = self.state();
        state.next_order += 1;
        let id = OrderId::new(state.next_order);
        state.orders.insert(
            id,
            Order {
                id,
                order_type: order_type.clone(),
                billing_profile: billing,
                shipments: Vec::new(),
            },
        );
        id
    }

    /// Add a shipment to an order and return its id.
    ///
    /// The shipment is appended to the order's shipment list when the order
    /// exists; an unknown order leaves a shipment with no parent listing.
    pub fn insert_shipment(&self, order_id: OrderId, shipping: Option<ProfileId>) -> ShipmentId {
        let mut state = self.state();
        state.next_shipment += 1;
        let id = ShipmentId::new(state.next_shipment);
        state.shipments.insert(
            id,
            Shipment {
                id,
                order_id,
                shipping_profile: shipping,
            },
        );
        if let Some(order) = state.orders.get_mut(&order_id) {
            order.shipments.push(id);
        }
        id
    }

    /// List a shipment id on an order without creating the shipment record.
    pub fn attach_missing_shipment(&self, order_id: OrderId, shipment: ShipmentId) {
        if let Some(order) = self.state().orders.get_mut(&order_id) {
            order.shipments.push(shipment);
        }
    }

    /// Add a profile category definition.
    pub fn insert_category(&self, definition: CategoryDefinition) {
        self.state()
            .categories
            .insert(definition.category, definition);
    }

    /// Add a field definition.
    pub fn insert_field(&self, field: FieldDefinition) {
        self.state().fields.push(field);
    }

    /// Add a display.
    pub fn insert_display(&self, display: EntityDisplay) {
        self.state().displays.push(display);
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Snapshot of a profile.
    #[must_use]
    pub fn profile(&self, id: ProfileId) -> Option<Profile> {
        self.state().profiles.get(&id).cloned()
    }

    /// Snapshot of every profile, by id.
    #[must_use]
    pub fn profiles(&self) -> Vec<Profile> {
        self.state().profiles.values().cloned().collect()
    }

    /// Snapshot of a shipment.
    #[must_use]
    pub fn shipment(&self, id: ShipmentId) -> Option<Shipment> {
        self.state().shipments.get(&id).cloned()
    }

    /// Snapshot of an order.
    #[must_use]
    pub fn order(&self, id: OrderId) -> Option<Order> {
        self.state().orders.get(&id).cloned()
    }

    /// Snapshot of an order type.
    #[must_use]
    pub fn order_type(&self, id: &OrderTypeId) -> Option<OrderType> {
        self.state().order_types.get(id).cloned()
    }

    /// Fields of a category, in definition order.
    #[must_use]
    pub fn fields_of(&self, category: ProfileCategory) -> Vec<FieldDefinition> {
        self.state()
            .fields
            .iter()
            .filter(|f| f.category == category)
            .cloned()
            .collect()
    }

    /// A display snapshot.
    #[must_use]
    pub fn display(
        &self,
        category: ProfileCategory,
        kind: DisplayKind,
        mode: &str,
    ) -> Option<EntityDisplay> {
        self.state()
            .displays
            .iter()
            .find(|d| d.category == category && d.kind == kind && d.mode == mode)
            .cloned()
    }

    /// Number of successful writes since the store was created.
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.state().writes
    }

    /// Whether the run lock is currently held.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state().locked
    }

    // =========================================================================
    // Failure injection
    // =========================================================================

    /// Make an operation fail until [`Self::clear_failures`] is called.
    pub fn fail_on(&self, point: FailPoint) {
        self.state().fail_points.insert(point);
    }

    /// Remove every fail point.
    pub fn clear_failures(&self) {
        self.state().fail_points.clear();
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn load_profile(&self, id: ProfileId) -> Result<Option<Profile>, StoreError> {
        let state = self.state();
        state.check(&FailPoint::LoadProfile(id))?;
        Ok(state.profiles.get(&id).cloned())
    }

    async fn save_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        let mut state = self.state();
        state.check(&FailPoint::SaveProfile(profile.id))?;
        let slot = state
            .profiles
            .get_mut(&profile.id)
            .ok_or_else(|| StoreError::NotFound(format!("profile {}", profile.id)))?;
        *slot = profile.clone();
        state.writes += 1;
        Ok(())
    }

    async fn create_duplicate(
        &self,
        source: &Profile,
        category: ProfileCategory,
    ) -> Result<Profile, StoreError> {
        let mut state = self.state();
        state.check(&FailPoint::DuplicateProfile(source.id))?;
        let id = state.allocate_profile_id();
        let duplicate = Profile::copy_of(id, source, category);
        state.profiles.insert(id, duplicate.clone());
        state.writes += 1;
        Ok(duplicate)
    }

    async fn find_duplicate_of(
        &self,
        original: ProfileId,
        category: ProfileCategory,
    ) -> Result<Option<Profile>, StoreError> {
        let state = self.state();
        state.check(&FailPoint::FindDuplicate(original))?;
        Ok(state
            .profiles
            .values()
            .find(|p| p.duplicated_from == Some(original) && p.category == category)
            .cloned())
    }
}

#[async_trait]
impl ShipmentStore for MemoryStore {
    async fn load_shipment(&self, id: ShipmentId) -> Result<Option<Shipment>, StoreError> {
        let state = self.state();
        state.check(&FailPoint::LoadShipment(id))?;
        Ok(state.shipments.get(&id).cloned())
    }

    async fn save_shipment(&self, shipment: &Shipment) -> Result<(), StoreError> {
        let mut state = self.state();
        state.check(&FailPoint::SaveShipment(shipment.id))?;
        let slot = state
            .shipments
            .get_mut(&shipment.id)
            .ok_or_else(|| StoreError::NotFound(format!("shipment {}", shipment.id)))?;
        *slot = shipment.clone();
        state.writes += 1;
        Ok(())
    }

    async fn find_shipments_by_shipping_profile(
        &self,
        profile: ProfileId,
    ) -> Result<Vec<Shipment>, StoreError> {
        let state = self.state();
        state.check(&FailPoint::FindShipments(profile))?;
        Ok(state
            .shipments
            .values()
            .filter(|s| s.shipping_profile == Some(profile))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn load_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let state = self.state();
        state.check(&FailPoint::LoadOrder(id))?;
        Ok(state.orders.get(&id).cloned())
    }

    async fn find_order_ids_by_type(
        &self,
        order_type: &OrderTypeId,
    ) -> Result<Vec<OrderId>, StoreError> {
        Ok(self
            .state()
            .orders
            .values()
            .filter(|o| &o.order_type == order_type)
            .map(|o| o.id)
            .collect())
    }

    async fn find_order_ids_by_billing_profile(
        &self,
        profile: ProfileId,
    ) -> Result<Vec<OrderId>, StoreError> {
        Ok(self
            .state()
            .orders
            .values()
            .filter(|o| o.billing_profile == Some(profile))
            .map(|o| o.id)
            .collect())
    }
}

#[async_trait]
impl CategoryStore for MemoryStore {
    async fn load_category(
        &self,
        category: ProfileCategory,
    ) -> Result<Option<CategoryDefinition>, StoreError> {
        Ok(self.state().categories.get(&category).cloned())
    }

    async fn create_category(&self, definition: &CategoryDefinition) -> Result<(), StoreError> {
        let mut state = self.state();
        state.check(&FailPoint::CreateCategory(definition.category))?;
        if state.categories.contains_key(&definition.category) {
            return Err(StoreError::Conflict(format!(
                "category {} already exists",
                definition.category
            )));
        }
        state
            .categories
            .insert(definition.category, definition.clone());
        state.writes += 1;
        Ok(())
    }

    async fn field_definitions(
        &self,
        category: ProfileCategory,
    ) -> Result<Vec<FieldDefinition>, StoreError> {
        Ok(self.fields_of(category))
    }

    async fn save_field_definition(&self, field: &FieldDefinition) -> Result<(), StoreError> {
        let mut state = self.state();
        if let Some(existing) = state
            .fields
            .iter_mut()
            .find(|f| f.category == field.category && f.name == field.name)
        {
            *existing = field.clone();
        } else {
            state.fields.push(field.clone());
        }
        state.writes += 1;
        Ok(())
    }

    async fn displays(&self, category: ProfileCategory) -> Result<Vec<EntityDisplay>, StoreError> {
        Ok(self
            .state()
            .displays
            .iter()
            .filter(|d| d.category == category)
            .cloned()
            .collect())
    }

    async fn load_display(
        &self,
        category: ProfileCategory,
        kind: DisplayKind,
        mode: &str,
    ) -> Result<Option<EntityDisplay>, StoreError> {
        Ok(self.display(category, kind, mode))
    }

    async fn save_display(&self, display: &EntityDisplay) -> Result<(), StoreError> {
        let mut state = self.state();
        state.check(&FailPoint::SaveDisplay(display.category))?;
        if let Some(existing) = state.displays.iter_mut().find(|d| {
            d.category == display.category && d.kind == display.kind && d.mode == display.mode
        }) {
            *existing = display.clone();
        } else {
            state.displays.push(display.clone());
        }
        state.writes += 1;
        Ok(())
    }
}

#[async_trait]
impl OrderTypeStore for MemoryStore {
    async fn load_order_type(&self, id: &OrderTypeId) -> Result<Option<OrderType>, StoreError> {
        Ok(self.order_type(id))
    }

    async fn save_profile_mode(
        &self,
        id: &OrderTypeId,
        mode: ProfileMode,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        let order_type = state
            .order_types
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("order type {id}")))?;
        order_type.profile_mode = mode;
        state.writes += 1;
        Ok(())
    }
}

#[async_trait]
impl RunLock for MemoryStore {
    async fn try_acquire(&self) -> Result<bool, StoreError> {
        let mut state = self.state();
        if state.locked {
            return Ok(false);
        }
        state.locked = true;
        Ok(true)
    }

    async fn release(&self) -> Result<(), StoreError> {
        self.state().locked = false;
        Ok(())
    }
}
