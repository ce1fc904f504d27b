//! Switching an order type from shared to split profiles.
//!
//! The switch provisions the split categories, migrates every existing order
//! of the type and only then persists the new mode. A run that leaves failed
//! or unprocessed orders keeps the type in single mode unless the caller
//! accepts a partial result.
//!
//! [`migrate_orders_with_cancel`] runs the same provision-then-migrate steps
//! for a chosen set of orders without touching the mode.

use std::future::Future;
use std::sync::atomic::AtomicBool;

use serde::Serialize;
use tracing::{info, instrument, warn};

use order_profiles_core::{OrderId, OrderTypeContext, OrderTypeId, ProfileMode};

use crate::error::TransitionError;
use crate::executor::{BatchExecutor, ExecutorConfig, MigrationReport};
use crate::provisioner::{ProvisionOutcome, Provisioner};
use crate::store::{MigrationStore, RunLock};

/// Options for [`enable_split_profiles`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionOptions {
    /// Persist split mode even when some orders failed.
    pub accept_partial: bool,
    pub executor: ExecutorConfig,
}

/// Result of a completed switch.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionReport {
    pub order_type: OrderTypeId,
    pub profile_mode: ProfileMode,
    pub provision: ProvisionOutcome,
    pub migration: MigrationReport,
}

/// Result of a batch run that leaves the mode flag alone.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationRun {
    pub provision: ProvisionOutcome,
    pub migration: MigrationReport,
}

/// What a switch would touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionPreview {
    pub order_type: OrderTypeId,
    pub label: String,
    pub profile_mode: ProfileMode,
    pub order_count: usize,
}

impl TransitionPreview {
    /// Operator-facing confirmation text.
    #[must_use]
    pub fn message(&self) -> String {
        if self.profile_mode.is_split() {
            return format!("{} already uses separate billing and shipping profiles.", self.label);
        }
        match self.order_count {
            0 => format!(
                "{} has no orders; billing and shipping profiles can be split right away.",
                self.label
            ),
            count => format!(
                "{count} existing {} orders will have their customer profiles split into billing and shipping profiles. This cannot be undone.",
                self.label
            ),
        }
    }
}

/// Describe the switch for an order type without changing anything.
///
/// # Errors
///
/// Returns [`TransitionError::UnknownOrderType`] or a store error.
pub async fn describe<S: MigrationStore + ?Sized>(
    store: &S,
    order_type: &OrderTypeId,
) -> Result<TransitionPreview, TransitionError> {
    let loaded = store
        .load_order_type(order_type)
        .await?
        .ok_or_else(|| TransitionError::UnknownOrderType(order_type.clone()))?;
    let order_count = store.find_order_ids_by_type(order_type).await?.len();

    Ok(TransitionPreview {
        order_type: loaded.id,
        label: loaded.label,
        profile_mode: loaded.profile_mode,
        order_count,
    })
}

/// Switch an order type to split billing and shipping profiles.
///
/// # Errors
///
/// See [`enable_split_profiles_with_cancel`].
pub async fn enable_split_profiles<S: MigrationStore + ?Sized>(
    store: &S,
    order_type: &OrderTypeId,
    options: TransitionOptions,
) -> Result<TransitionReport, TransitionError> {
    let never = AtomicBool::new(false);
    enable_split_profiles_with_cancel(store, order_type, options, &never).await
}

/// Switch an order type to split profiles, stopping between chunks when
/// `cancel` is set.
///
/// A cancelled run always leaves the mode unchanged.
///
/// # Errors
///
/// - [`TransitionError::UnknownOrderType`] / [`TransitionError::AlreadySplit`]
///   before anything is written
/// - [`TransitionError::Busy`] when another run holds the lock
/// - [`TransitionError::Provision`] when the categories cannot be created
/// - [`TransitionError::Incomplete`] when orders failed or were left
///   unprocessed and a partial result was not accepted
#[instrument(skip(store, options, cancel), fields(order_type = %order_type))]
pub async fn enable_split_profiles_with_cancel<S: MigrationStore + ?Sized>(
    store: &S,
    order_type: &OrderTypeId,
    options: TransitionOptions,
    cancel: &AtomicBool,
) -> Result<TransitionReport, TransitionError> {
    let loaded = store
        .load_order_type(order_type)
        .await?
        .ok_or_else(|| TransitionError::UnknownOrderType(order_type.clone()))?;
    if loaded.profile_mode.is_split() {
        return Err(TransitionError::AlreadySplit(order_type.clone()));
    }
    let target = loaded.profile_mode.transition_to(ProfileMode::Split)?;

    let ctx = loaded.context();
    under_lock(store, run_locked(store, &ctx, target, options, cancel)).await
}

/// Provision the split categories, then migrate `order_ids` to split
/// profiles. The order type's mode is not changed.
///
/// Orders are only touched once provisioning has succeeded.
///
/// # Errors
///
/// - [`TransitionError::Busy`] when another run holds the lock
/// - [`TransitionError::Provision`] when the categories cannot be created;
///   no order has been migrated
///
/// Failed or unprocessed orders are reported in the returned
/// [`MigrationReport`], not as an error.
#[instrument(skip(store, order_ids, executor, cancel), fields(order_type = %ctx.order_type))]
pub async fn migrate_orders_with_cancel<S: MigrationStore + ?Sized>(
    store: &S,
    ctx: &OrderTypeContext,
    order_ids: &[OrderId],
    executor: ExecutorConfig,
    cancel: &AtomicBool,
) -> Result<MigrationRun, TransitionError> {
    under_lock(
        store,
        provision_and_migrate(store, ctx, order_ids, executor, cancel),
    )
    .await
}

async fn provision_and_migrate<S: MigrationStore + ?Sized>(
    store: &S,
    ctx: &OrderTypeContext,
    order_ids: &[OrderId],
    executor: ExecutorConfig,
    cancel: &AtomicBool,
) -> Result<MigrationRun, TransitionError> {
    let split = ctx.targeting_split();
    let provision = Provisioner::new(store).provision(&split).await?;
    let migration = BatchExecutor::new(store, executor)
        .migrate_with_cancel(order_ids, &split, cancel)
        .await;
    Ok(MigrationRun {
        provision,
        migration,
    })
}

/// Run `work` while holding the run lock, releasing it on every path.
async fn under_lock<S, T>(
    store: &S,
    work: impl Future<Output = Result<T, TransitionError>>,
) -> Result<T, TransitionError>
where
    S: RunLock + ?Sized,
{
    if !store.try_acquire().await? {
        return Err(TransitionError::Busy);
    }

    let result = work.await;

    match (store.release().await, result) {
        (Ok(()), result) => result,
        (Err(e), Ok(_)) => Err(e.into()),
        (Err(e), Err(original)) => {
            warn!(error = %e, "Failed to release migration lock");
            Err(original)
        }
    }
}

async fn run_locked<S: MigrationStore + ?Sized>(
    store: &S,
    ctx: &OrderTypeContext,
    target: ProfileMode,
    options: TransitionOptions,
    cancel: &AtomicBool,
) -> Result<TransitionReport, TransitionError> {
    let split = ctx.targeting_split();
    let provision = Provisioner::new(store).provision(&split).await?;

    let order_ids = store.find_order_ids_by_type(&ctx.order_type).await?;
    let migration = BatchExecutor::new(store, options.executor)
        .migrate_with_cancel(&order_ids, &split, cancel)
        .await;

    if migration.cancelled || (!migration.failed.is_empty() && !options.accept_partial) {
        warn!(
            failed = migration.failed.len(),
            unprocessed = migration.unprocessed.len(),
            "Profile mode left unchanged"
        );
        return Err(TransitionError::Incomplete(Box::new(migration)));
    }

    store.save_profile_mode(&ctx.order_type, target).await?;
    info!(
        succeeded = migration.succeeded.len(),
        failed = migration.failed.len(),
        "Order type switched to split profiles"
    );

    Ok(TransitionReport {
        order_type: ctx.order_type.clone(),
        profile_mode: target,
        provision,
        migration,
    })
}
