//! Background loop that pulls order status from the source and merges it into
//! the cache.
//!
//! Each cycle is fetch, merge, rebuild. A failed cycle is logged and skipped;
//! the loop itself only ends on shutdown.

use std::time::Duration;

use pickup_db::{DbError, OrderCache};
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::shutdown::ShutdownSignal;
use crate::snapshot::ViewProjector;
use crate::source::{SourceError, SourceReader};

/// Default time between reconciliation cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Failure of one reconciliation cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    #[error("order cache error: {0}")]
    Store(#[from] DbError),
}

/// Outcome of one successful cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Rows returned by the source
    pub fetched: usize,
    /// Rows inserted or changed in the cache
    pub written: usize,
    pub being_prepared: usize,
    pub ready_to_collect: usize,
}

pub struct Reconciler<S> {
    source: S,
    cache: OrderCache,
    projector: ViewProjector,
    interval: Duration,
}

impl<S: SourceReader> Reconciler<S> {
    pub fn new(source: S, cache: OrderCache, projector: ViewProjector, interval: Duration) -> Self {
        Self {
            source,
            cache,
            projector,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Run a single fetch, merge and rebuild pass.
    pub async fn run_cycle(&self) -> Result<CycleReport, SyncError> {
        let updates = self.source.fetch_active().await?;
        let written = self.cache.upsert_many(&updates).await?;
        let snapshot = self.projector.refresh().await?;

        Ok(CycleReport {
            fetched: updates.len(),
            written,
            being_prepared: snapshot.being_prepared.len(),
            ready_to_collect: snapshot.ready_to_collect.len(),
        })
    }

    /// Run cycles every interval until `shutdown` fires.
    ///
    /// A cycle that overruns the interval is followed immediately by the next
    /// one. Shutdown also interrupts a cycle in flight; an interrupted merge
    /// rolls back and is redone on the next start.
    pub async fn run(self, shutdown: ShutdownSignal) {
        info!(interval_ms = self.interval.as_millis() as u64, "Reconciler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                result = self.run_cycle() => match result {
                    Ok(report) => debug!(
                        fetched = report.fetched,
                        written = report.written,
                        being_prepared = report.being_prepared,
                        ready_to_collect = report.ready_to_collect,
                        "Orders updated"
                    ),
                    Err(SyncError::SourceUnavailable(e)) => {
                        warn!("Skipping cycle, {}", e);
                    }
                    Err(e) => error!("Error updating orders: {}", e),
                },
            }
        }

        info!("Reconciler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pickup_db::OrderUpdate;

    struct FixedSource(Vec<OrderUpdate>);

    #[async_trait]
    impl SourceReader for FixedSource {
        async fn fetch_active(&self) -> Result<Vec<OrderUpdate>, SourceError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_cycle_report_counts() {
        let cache = OrderCache::open_memory().await.unwrap();
        cache.ensure_table().await.unwrap();
        let projector = ViewProjector::new(cache.clone());
        let reconciler = Reconciler::new(
            FixedSource(vec![
                OrderUpdate::new("1", 50),
                OrderUpdate::new("2", 60),
                OrderUpdate::new("3", 60),
            ]),
            cache,
            projector,
            DEFAULT_POLL_INTERVAL,
        );

        let first = reconciler.run_cycle().await.unwrap();
        assert_eq!(
            first,
            CycleReport {
                fetched: 3,
                written: 3,
                being_prepared: 1,
                ready_to_collect: 2,
            }
        );

        let second = reconciler.run_cycle().await.unwrap();
        assert_eq!(second.written, 0);
        assert_eq!(second.fetched, 3);
    }

    #[tokio::test]
    async fn test_missing_table_is_a_store_error() {
        let cache = OrderCache::open_memory().await.unwrap();
        let projector = ViewProjector::new(cache.clone());
        let reconciler = Reconciler::new(
            FixedSource(vec![OrderUpdate::new("1", 50)]),
            cache,
            projector,
            DEFAULT_POLL_INTERVAL,
        );

        let err = reconciler.run_cycle().await.unwrap_err();
        assert!(matches!(err, SyncError::Store(_)));
    }
}
