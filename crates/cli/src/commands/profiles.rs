//! Split-profile migration commands.
//!
//! # Usage
//!
//! ```bash
//! op-cli provision
//! op-cli plan 42 --order-type default
//! op-cli migrate --order-type default --order 42 --order 43
//! op-cli enable --order-type default --accept-partial
//! op-cli status --order-type default --format yaml
//! ```
//!
//! `migrate` and `enable` stop at the next chunk boundary on Ctrl-C. Orders
//! already processed stay migrated; rerunning picks up the rest.

use serde::Serialize;
use thiserror::Error;

use order_profiles_core::{OrderId, OrderTypeContext, OrderTypeId, ProfileMode};
use order_profiles_migrator::{
    ExecutorConfig, MigrationPlanner, MigratorConfig, OrderStore, OrderTypeStore, PlanError,
    ProvisionError, Provisioner, StoreError, TransitionError, TransitionOptions, describe,
    enable_split_profiles_with_cancel, migrate_orders_with_cancel,
};

use super::{CommandError, OutputFormat, cancel_on_ctrl_c, connect, emit};

/// Errors from the profile commands.
#[derive(Debug, Error)]
pub enum ProfileCommandError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Order type not found: {0}")]
    UnknownOrderType(OrderTypeId),

    #[error("Another profile migration is already running")]
    Busy,

    #[error("{failed} of {total} orders failed to migrate")]
    Incomplete { failed: usize, total: usize },

    #[error("Migration cancelled with {0} orders left unprocessed")]
    Cancelled(usize),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Serialize)]
struct Status {
    order_type: OrderTypeId,
    label: String,
    profile_mode: ProfileMode,
    order_count: usize,
    message: String,
}

fn executor_config(config: &MigratorConfig, chunk_size: Option<usize>) -> ExecutorConfig {
    chunk_size.map_or_else(|| config.executor(), ExecutorConfig::new)
}

async fn load_context(
    store: &impl OrderTypeStore,
    order_type: &OrderTypeId,
) -> Result<OrderTypeContext, ProfileCommandError> {
    store
        .load_order_type(order_type)
        .await?
        .map(|t| t.context())
        .ok_or_else(|| ProfileCommandError::UnknownOrderType(order_type.clone()))
}

/// Create the billing and shipping categories.
pub async fn provision(
    order_type: &OrderTypeId,
    format: OutputFormat,
) -> Result<(), ProfileCommandError> {
    let (_, store) = connect().await?;
    let ctx = load_context(&store, order_type).await?;

    let outcome = Provisioner::new(&store).provision(&ctx.targeting_split()).await?;
    emit(&outcome, format)?;
    Ok(())
}

/// Print the plan for one order as the split switch would apply it.
pub async fn plan(
    order_id: OrderId,
    order_type: &OrderTypeId,
    format: OutputFormat,
) -> Result<(), ProfileCommandError> {
    let (_, store) = connect().await?;
    let ctx = load_context(&store, order_type).await?;

    let plan = MigrationPlanner::new(&store)
        .plan_for(order_id, &ctx.targeting_split())
        .await?;
    emit(&plan, format)?;
    Ok(())
}

/// Provision the split categories and run the batch migration without
/// touching the mode flag.
pub async fn migrate(
    order_type: &OrderTypeId,
    chunk_size: Option<usize>,
    orders: &[OrderId],
    format: OutputFormat,
) -> Result<(), ProfileCommandError> {
    let (config, store) = connect().await?;
    let ctx = load_context(&store, order_type).await?;

    let order_ids = if orders.is_empty() {
        store.find_order_ids_by_type(order_type).await?
    } else {
        orders.to_vec()
    };

    let cancel = cancel_on_ctrl_c();
    let run = match migrate_orders_with_cancel(
        &store,
        &ctx,
        &order_ids,
        executor_config(&config, chunk_size),
        &cancel,
    )
    .await
    {
        Ok(run) => run,
        Err(TransitionError::Busy) => return Err(ProfileCommandError::Busy),
        Err(e) => return Err(e.into()),
    };

    emit(&run, format)?;
    let report = run.migration;

    if report.cancelled {
        return Err(ProfileCommandError::Cancelled(report.unprocessed.len()));
    }
    if !report.failed.is_empty() {
        return Err(ProfileCommandError::Incomplete {
            failed: report.failed.len(),
            total: report.total(),
        });
    }
    Ok(())
}

/// Provision, migrate every order and switch the order type to split mode.
pub async fn enable(
    order_type: &OrderTypeId,
    accept_partial: bool,
    chunk_size: Option<usize>,
    format: OutputFormat,
) -> Result<(), ProfileCommandError> {
    let (config, store) = connect().await?;

    let preview = describe(&store, order_type).await?;
    tracing::info!("{}", preview.message());

    let options = TransitionOptions {
        accept_partial,
        executor: executor_config(&config, chunk_size),
    };
    let cancel = cancel_on_ctrl_c();

    match enable_split_profiles_with_cancel(&store, order_type, options, &cancel).await {
        Ok(report) => {
            emit(&report, format)?;
            Ok(())
        }
        Err(TransitionError::Incomplete(report)) => {
            emit(&report, format)?;
            Err(TransitionError::Incomplete(report).into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Show an order type's mode and how many orders a switch would touch.
pub async fn status(
    order_type: &OrderTypeId,
    format: OutputFormat,
) -> Result<(), ProfileCommandError> {
    let (_, store) = connect().await?;

    let preview = describe(&store, order_type).await?;
    let status = Status {
        message: preview.message(),
        order_type: preview.order_type,
        label: preview.label,
        profile_mode: preview.profile_mode,
        order_count: preview.order_count,
    };
    emit(&status, format)?;
    Ok(())
}
