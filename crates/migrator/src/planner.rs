//! Migration planner.
//!
//! For one order, works out what has to happen to its billing profile and to
//! each shipment's profile, then applies that plan.
//!
//! A shipping profile needs its own record (duplicate-and-repoint) when it is
//! the same physical record as a billing profile: either this order's billing
//! profile, or the billing profile of any other order. Identity decides, never
//! address equality. Everything else is retyped in place.
//!
//! Every write is skipped when the record is already in its target state, so
//! applying the plan for an already-migrated order writes nothing.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, instrument};

use order_profiles_core::{
    Order, OrderId, OrderTypeContext, Profile, ProfileCategory, ProfileId, ShipmentId,
};

use crate::error::{PlanError, RecordRef};
use crate::registry::{self, ProfileTargets};
use crate::resolver::ReferenceResolver;
use crate::store::RecordStore;

/// What happens to one profile reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileAction {
    /// Already in the target category.
    Unchanged,
    /// Change the category in place, keeping the id.
    Retype,
    /// Copy the profile into a new shipping record and move every shipment
    /// referencing the original onto the copy.
    DuplicateAndRepoint,
    /// Shares an identity with an earlier step of the same plan; the resolver
    /// run by that step moves this shipment too.
    RepointedByFanOut,
}

/// The billing part of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingStep {
    pub profile_id: ProfileId,
    pub current: ProfileCategory,
    pub action: ProfileAction,
    /// Shipments of other orders that ship to this billing profile.
    pub foreign_shipments: Vec<ShipmentId>,
}

/// The part of a plan for one shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShipmentStep {
    pub shipment_id: ShipmentId,
    pub profile_id: ProfileId,
    pub current: ProfileCategory,
    pub action: ProfileAction,
}

/// Everything the migration would do to one order.
///
/// Plans are computed right before they are applied and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationPlan {
    pub order_id: OrderId,
    pub targets: ProfileTargets,
    /// `None` when the order has no billing profile.
    pub billing: Option<BillingStep>,
    /// Shipments with a shipping profile, in the order's shipment order.
    pub shipments: Vec<ShipmentStep>,
}

impl MigrationPlan {
    /// Whether applying the plan writes nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        let billing_idle = self
            .billing
            .as_ref()
            .is_none_or(|b| b.action == ProfileAction::Unchanged && !self.detaches_billing());
        billing_idle
            && self.shipments.iter().all(|s| {
                matches!(
                    s.action,
                    ProfileAction::Unchanged | ProfileAction::RepointedByFanOut
                )
            })
    }

    /// Whether the billing profile must be split away from shipments of other
    /// orders because no shipment of this order does it.
    #[must_use]
    pub fn detaches_billing(&self) -> bool {
        let Some(billing) = &self.billing else {
            return false;
        };
        !billing.foreign_shipments.is_empty()
            && !self.shipments.iter().any(|s| {
                s.profile_id == billing.profile_id && s.action == ProfileAction::DuplicateAndRepoint
            })
    }
}

/// A profile copied into a new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Duplication {
    pub original: ProfileId,
    pub replacement: ProfileId,
}

/// What applying a plan changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanOutcome {
    pub retyped: Vec<ProfileId>,
    pub duplicated: Vec<Duplication>,
    pub repointed: Vec<ShipmentId>,
}

impl PlanOutcome {
    /// Whether nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.retyped.is_empty() && self.duplicated.is_empty() && self.repointed.is_empty()
    }
}

fn retype_or_unchanged(current: ProfileCategory, target: ProfileCategory) -> ProfileAction {
    if current == target {
        ProfileAction::Unchanged
    } else {
        ProfileAction::Retype
    }
}

/// Plans and applies one order at a time.
pub struct MigrationPlanner<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> MigrationPlanner<'a, S> {
    /// Create a planner over a record store.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Compute the plan for one order without writing anything.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::OrderNotFound`] for an unknown order,
    /// [`PlanError::ShipmentNotFound`] when the order lists a shipment that
    /// does not exist, and [`PlanError::Load`] when a read fails.
    #[instrument(skip(self, ctx), fields(order_type = %ctx.order_type))]
    pub async fn plan_for(
        &self,
        order_id: OrderId,
        ctx: &OrderTypeContext,
    ) -> Result<MigrationPlan, PlanError> {
        let targets = registry::resolve(ctx);
        let order = self
            .store
            .load_order(order_id)
            .await
            .map_err(PlanError::load(RecordRef::Order(order_id)))?
            .ok_or(PlanError::OrderNotFound(order_id))?;

        let billing_profile = match order.billing_profile {
            Some(id) => self.load_profile(id).await?,
            None => None,
        };
        let billing_id = billing_profile.as_ref().map(|p| p.id);

        let shipments = self.plan_shipments(&order, billing_id, targets).await?;

        let billing = match billing_profile {
            Some(profile) => Some(BillingStep {
                profile_id: profile.id,
                current: profile.category,
                action: retype_or_unchanged(profile.category, targets.billing),
                foreign_shipments: self.foreign_shipments(&order, &profile, targets).await?,
            }),
            None => None,
        };

        let plan = MigrationPlan {
            order_id,
            targets,
            billing,
            shipments,
        };
        debug!(noop = plan.is_noop(), "Planned order");
        Ok(plan)
    }

    async fn plan_shipments(
        &self,
        order: &Order,
        billing_id: Option<ProfileId>,
        targets: ProfileTargets,
    ) -> Result<Vec<ShipmentStep>, PlanError> {
        let mut split_identities: HashSet<ProfileId> = HashSet::new();
        let mut steps = Vec::with_capacity(order.shipments.len());

        for &shipment_id in &order.shipments {
            let shipment = self
                .store
                .load_shipment(shipment_id)
                .await
                .map_err(PlanError::load(RecordRef::Shipment(shipment_id)))?
                .ok_or(PlanError::ShipmentNotFound {
                    order_id: order.id,
                    shipment_id,
                })?;

            let Some(profile_id) = shipment.shipping_profile else {
                continue;
            };
            let Some(profile) = self.load_profile(profile_id).await? else {
                continue;
            };

            let action = if !targets.is_split() {
                retype_or_unchanged(profile.category, targets.shipping)
            } else if split_identities.contains(&profile.id) {
                ProfileAction::RepointedByFanOut
            } else if self.is_billing_identity(&profile, billing_id).await? {
                split_identities.insert(profile.id);
                ProfileAction::DuplicateAndRepoint
            } else {
                retype_or_unchanged(profile.category, targets.shipping)
            };

            steps.push(ShipmentStep {
                shipment_id,
                profile_id: profile.id,
                current: profile.category,
                action,
            });
        }

        Ok(steps)
    }

    /// Whether a shipping profile is also some order's billing profile.
    async fn is_billing_identity(
        &self,
        profile: &Profile,
        billing_id: Option<ProfileId>,
    ) -> Result<bool, PlanError> {
        if billing_id == Some(profile.id) {
            return Ok(true);
        }

        let claims = self
            .store
            .find_order_ids_by_billing_profile(profile.id)
            .await
            .map_err(PlanError::load(RecordRef::Profile(profile.id)))?;
        Ok(!claims.is_empty())
    }

    async fn foreign_shipments(
        &self,
        order: &Order,
        billing: &Profile,
        targets: ProfileTargets,
    ) -> Result<Vec<ShipmentId>, PlanError> {
        if !targets.is_split() {
            return Ok(Vec::new());
        }

        let shipments = self
            .store
            .find_shipments_by_shipping_profile(billing.id)
            .await
            .map_err(PlanError::load(RecordRef::Profile(billing.id)))?;

        Ok(shipments
            .into_iter()
            .filter(|s| s.order_id != order.id)
            .map(|s| s.id)
            .collect())
    }

    async fn load_profile(&self, id: ProfileId) -> Result<Option<Profile>, PlanError> {
        self.store
            .load_profile(id)
            .await
            .map_err(PlanError::load(RecordRef::Profile(id)))
    }

    async fn require_profile(&self, id: ProfileId) -> Result<Profile, PlanError> {
        self.load_profile(id)
            .await?
            .ok_or(PlanError::Vanished(RecordRef::Profile(id)))
    }

    /// Apply a plan computed by [`Self::plan_for`].
    ///
    /// The billing profile is retyped first, then each shipment step runs in
    /// order. A failure stops the order where it is; every step already done is
    /// safe to repeat.
    ///
    /// # Errors
    ///
    /// Returns a [`PlanError`] for the first load, save, duplicate or repoint
    /// that fails.
    pub async fn apply(&self, plan: &MigrationPlan) -> Result<PlanOutcome, PlanError> {
        let mut outcome = PlanOutcome::default();
        self.apply_into(plan, &mut outcome).await?;
        Ok(outcome)
    }

    #[instrument(skip(self, plan, outcome), fields(order = %plan.order_id))]
    async fn apply_into(
        &self,
        plan: &MigrationPlan,
        outcome: &mut PlanOutcome,
    ) -> Result<(), PlanError> {
        if let Some(billing) = &plan.billing
            && billing.action == ProfileAction::Retype
        {
            self.retype(billing.profile_id, plan.targets.billing, outcome)
                .await?;
        }

        for step in &plan.shipments {
            match step.action {
                ProfileAction::Unchanged | ProfileAction::RepointedByFanOut => {}
                ProfileAction::Retype => {
                    self.retype(step.profile_id, plan.targets.shipping, outcome)
                        .await?;
                }
                ProfileAction::DuplicateAndRepoint => {
                    self.duplicate_and_repoint(
                        step.profile_id,
                        Some(step.shipment_id),
                        plan.targets.shipping,
                        outcome,
                    )
                    .await?;
                }
            }
        }

        if plan.detaches_billing()
            && let Some(billing) = &plan.billing
        {
            self.duplicate_and_repoint(billing.profile_id, None, plan.targets.shipping, outcome)
                .await?;
        }

        if !outcome.is_empty() {
            info!(
                retyped = outcome.retyped.len(),
                duplicated = outcome.duplicated.len(),
                repointed = outcome.repointed.len(),
                "Migrated order profiles"
            );
        }
        Ok(())
    }

    /// Plan and apply one order.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Self::plan_for`] or [`Self::apply`].
    pub async fn migrate_order(
        &self,
        order_id: OrderId,
        ctx: &OrderTypeContext,
    ) -> Result<PlanOutcome, PlanError> {
        let mut outcome = PlanOutcome::default();
        self.migrate_order_into(order_id, ctx, &mut outcome).await?;
        Ok(outcome)
    }

    /// Plan and apply one order, recording writes into `outcome` as they
    /// happen.
    ///
    /// On error, `outcome` still holds the writes made before the failure.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Self::plan_for`] or [`Self::apply`].
    pub async fn migrate_order_into(
        &self,
        order_id: OrderId,
        ctx: &OrderTypeContext,
        outcome: &mut PlanOutcome,
    ) -> Result<(), PlanError> {
        let plan = self.plan_for(order_id, ctx).await?;
        self.apply_into(&plan, outcome).await
    }

    async fn retype(
        &self,
        id: ProfileId,
        target: ProfileCategory,
        outcome: &mut PlanOutcome,
    ) -> Result<(), PlanError> {
        let mut profile = self.require_profile(id).await?;
        if profile.category == target {
            return Ok(());
        }

        let from = profile.category;
        profile.category = target;
        self.store
            .save_profile(&profile)
            .await
            .map_err(PlanError::save(RecordRef::Profile(id)))?;

        debug!(profile = %id, from = %from, to = %target, "Retyped profile");
        outcome.retyped.push(id);
        Ok(())
    }

    /// Copy `original` into a new profile and move shipments onto it.
    ///
    /// A copy left behind by an earlier, interrupted run is reused instead of
    /// creating another one. With `shipment` set, that shipment is rewritten first and the resolver
    /// handles the rest. Without it, the resolver moves every shipment.
    async fn duplicate_and_repoint(
        &self,
        original: ProfileId,
        shipment: Option<ShipmentId>,
        category: ProfileCategory,
        outcome: &mut PlanOutcome,
    ) -> Result<(), PlanError> {
        let mut rewritten = None;
        if let Some(shipment_id) = shipment {
            let record = self
                .store
                .load_shipment(shipment_id)
                .await
                .map_err(PlanError::load(RecordRef::Shipment(shipment_id)))?
                .ok_or(PlanError::Vanished(RecordRef::Shipment(shipment_id)))?;

            if record.shipping_profile != Some(original) {
                debug!(shipment = %shipment_id, "Shipment already moved off shared profile");
                return Ok(());
            }
            rewritten = Some(record);
        }

        let existing = self
            .store
            .find_duplicate_of(original, category)
            .await
            .map_err(PlanError::load(RecordRef::Profile(original)))?;
        let duplicate = if let Some(existing) = existing {
            debug!(original = %original, replacement = %existing.id, "Reusing earlier duplicate");
            existing
        } else {
            let source = self.require_profile(original).await?;
            let created = self
                .store
                .create_duplicate(&source, category)
                .await
                .map_err(|source| PlanError::Duplicate {
                    profile: original,
                    source,
                })?;
            outcome.duplicated.push(Duplication {
                original,
                replacement: created.id,
            });
            info!(original = %original, replacement = %created.id, "Duplicated shared profile");
            created
        };

        if let Some(mut record) = rewritten {
            record.shipping_profile = Some(duplicate.id);
            self.store
                .save_shipment(&record)
                .await
                .map_err(PlanError::save(RecordRef::Shipment(record.id)))?;
            outcome.repointed.push(record.id);
        }

        let others = ReferenceResolver::new(self.store)
            .repoint(original, duplicate.id, shipment)
            .await?;
        outcome.repointed.extend(others);
        Ok(())
    }
}
