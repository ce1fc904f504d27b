//! Batch executor.
//!
//! Runs the planner over a list of orders in fixed-size chunks. A failing
//! order is recorded and skipped; the batch always runs to the end unless it
//! is cancelled between chunks.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use order_profiles_core::{OrderId, OrderTypeContext};

use crate::planner::{MigrationPlanner, PlanOutcome};
use crate::store::RecordStore;

/// Default number of orders per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// Batch executor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    chunk_size: usize,
}

impl ExecutorConfig {
    /// Create a config. A chunk size of zero is raised to one.
    #[must_use]
    pub const fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: if chunk_size == 0 { 1 } else { chunk_size },
        }
    }

    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

/// An order that could not be migrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedOrder {
    pub order_id: OrderId,
    pub error: String,
}

/// Write counters accumulated over a run.
///
/// Writes made by an order before it failed are counted too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationCounters {
    pub profiles_retyped: usize,
    pub profiles_duplicated: usize,
    pub shipments_repointed: usize,
    pub chunks: usize,
}

impl MigrationCounters {
    fn record(&mut self, outcome: &PlanOutcome) {
        self.profiles_retyped += outcome.retyped.len();
        self.profiles_duplicated += outcome.duplicated.len();
        self.shipments_repointed += outcome.repointed.len();
    }
}

/// Outcome of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub succeeded: Vec<OrderId>,
    pub failed: Vec<FailedOrder>,
    pub counters: MigrationCounters,
    /// Set when the run stopped at a chunk boundary on request.
    pub cancelled: bool,
    /// Orders never attempted because the run was cancelled.
    pub unprocessed: Vec<OrderId>,
}

impl MigrationReport {
    fn start() -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            succeeded: Vec::new(),
            failed: Vec::new(),
            counters: MigrationCounters::default(),
            cancelled: false,
            unprocessed: Vec::new(),
        }
    }

    /// Orders attempted in this run.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Whether every attempted order succeeded and nothing was left over.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }

    /// Ids of the orders that failed.
    #[must_use]
    pub fn failed_ids(&self) -> Vec<OrderId> {
        self.failed.iter().map(|f| f.order_id).collect()
    }
}

/// Migrates orders in chunks.
pub struct BatchExecutor<'a, S: ?Sized> {
    store: &'a S,
    config: ExecutorConfig,
}

impl<'a, S: RecordStore + ?Sized> BatchExecutor<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S, config: ExecutorConfig) -> Self {
        Self { store, config }
    }

    /// Migrate every order in `order_ids`.
    pub async fn migrate(&self, order_ids: &[OrderId], ctx: &OrderTypeContext) -> MigrationReport {
        let never = AtomicBool::new(false);
        self.migrate_with_cancel(order_ids, ctx, &never).await
    }

    /// Migrate `order_ids`, checking `cancel` before each chunk.
    ///
    /// Chunks already processed stay migrated when the run is cancelled; the
    /// ids that were never attempted are listed in the report.
    #[instrument(
        skip(self, order_ids, ctx, cancel),
        fields(order_type = %ctx.order_type, orders = order_ids.len())
    )]
    pub async fn migrate_with_cancel(
        &self,
        order_ids: &[OrderId],
        ctx: &OrderTypeContext,
        cancel: &AtomicBool,
    ) -> MigrationReport {
        let planner = MigrationPlanner::new(self.store);
        let mut report = MigrationReport::start();
        info!(run_id = %report.run_id, chunk_size = self.config.chunk_size, "Starting profile migration");

        for (index, chunk) in order_ids.chunks(self.config.chunk_size).enumerate() {
            if cancel.load(Ordering::SeqCst) {
                let done = index * self.config.chunk_size;
                report.unprocessed = order_ids.get(done..).unwrap_or_default().to_vec();
                report.cancelled = true;
                warn!(
                    remaining = report.unprocessed.len(),
                    "Profile migration cancelled"
                );
                break;
            }

            for &order_id in chunk {
                let mut outcome = PlanOutcome::default();
                let result = planner
                    .migrate_order_into(order_id, ctx, &mut outcome)
                    .await;
                report.counters.record(&outcome);
                match result {
                    Ok(()) => report.succeeded.push(order_id),
                    Err(e) => {
                        warn!(order = %order_id, error = %e, "Order migration failed");
                        report.failed.push(FailedOrder {
                            order_id,
                            error: e.to_string(),
                        });
                    }
                }
            }

            report.counters.chunks += 1;
            info!(
                chunk = index + 1,
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                "Processed chunk"
            );
        }

        report.finished_at = Utc::now();
        info!(
            run_id = %report.run_id,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            retyped = report.counters.profiles_retyped,
            duplicated = report.counters.profiles_duplicated,
            repointed = report.counters.shipments_repointed,
            "Profile migration finished"
        );
        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use order_profiles_core::{Address, OrderTypeId, ProfileCategory, ProfileMode};

    use super::*;
    use crate::store::{FailPoint, MemoryStore};

    fn split() -> OrderTypeContext {
        OrderTypeContext::new(OrderTypeId::parse("default").unwrap(), ProfileMode::Split)
    }

    fn seed(store: &MemoryStore, count: usize) -> Vec<OrderId> {
        let order_type = OrderTypeId::parse("default").unwrap();
        (0..count)
            .map(|_| {
                let profile = store.insert_profile(ProfileCategory::Shared, Address::new("US", "NY"));
                let order = store.insert_order(&order_type, Some(profile));
                store.insert_shipment(order, Some(profile));
                order
            })
            .collect()
    }

    #[test]
    fn test_zero_chunk_size_is_raised_to_one() {
        assert_eq!(ExecutorConfig::new(0).chunk_size(), 1);
        assert_eq!(ExecutorConfig::default().chunk_size(), DEFAULT_CHUNK_SIZE);
    }

    #[tokio::test]
    async fn test_counts_chunks_and_writes() {
        let store = MemoryStore::new();
        let orders = seed(&store, 5);

        let report = BatchExecutor::new(&store, ExecutorConfig::new(2))
            .migrate(&orders, &split())
            .await;

        assert_eq!(report.succeeded, orders);
        assert!(report.is_complete());
        assert_eq!(report.counters.chunks, 3);
        assert_eq!(report.counters.profiles_retyped, 5);
        assert_eq!(report.counters.profiles_duplicated, 5);
        assert_eq!(report.counters.shipments_repointed, 5);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_batch() {
        let store = MemoryStore::new();
        let orders = seed(&store, 3);
        store.fail_on(FailPoint::LoadOrder(orders[1]));

        let report = BatchExecutor::new(&store, ExecutorConfig::new(1))
            .migrate(&orders, &split())
            .await;

        assert_eq!(report.succeeded, vec![orders[0], orders[2]]);
        assert_eq!(report.failed_ids(), vec![orders[1]]);
        assert_eq!(report.total(), 3);
        assert!(report.failed[0].error.contains("failed to load order"));
    }

    #[tokio::test]
    async fn test_writes_of_failed_orders_are_counted() {
        let store = MemoryStore::new();
        let orders = seed(&store, 1);
        let shipment = store.order(orders[0]).unwrap().shipments[0];
        store.fail_on(FailPoint::SaveShipment(shipment));

        let report = BatchExecutor::new(&store, ExecutorConfig::default())
            .migrate(&orders, &split())
            .await;

        assert_eq!(report.failed_ids(), orders);
        assert_eq!(report.counters.profiles_retyped, 1);
        assert_eq!(report.counters.profiles_duplicated, 1);
        assert_eq!(report.counters.shipments_repointed, 0);
        assert_eq!(store.writes(), 2);
    }

    #[tokio::test]
    async fn test_cancel_before_first_chunk_leaves_everything_unprocessed() {
        let store = MemoryStore::new();
        let orders = seed(&store, 4);
        let cancel = AtomicBool::new(true);

        let report = BatchExecutor::new(&store, ExecutorConfig::new(2))
            .migrate_with_cancel(&orders, &split(), &cancel)
            .await;

        assert!(report.cancelled);
        assert_eq!(report.unprocessed, orders);
        assert_eq!(report.total(), 0);
        assert_eq!(store.writes(), 0);
    }
}
