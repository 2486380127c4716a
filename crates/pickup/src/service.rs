//! Operations the web tier performs against the core.

use std::sync::Arc;

use pickup_db::{DbError, OrderCache, OrderRecord};
use thiserror::Error;
use tracing::{info, warn};

use crate::snapshot::{Snapshot, ViewProjector};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Order not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(DbError),
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => Self::NotFound(msg),
            other => Self::Store(other),
        }
    }
}

#[derive(Clone)]
pub struct OrderService {
    cache: OrderCache,
    projector: ViewProjector,
}

impl OrderService {
    pub fn new(cache: OrderCache, projector: ViewProjector) -> Self {
        Self { cache, projector }
    }

    /// The board as of the last rebuild.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.projector.current()
    }

    /// Every cached order, collected or not.
    pub async fn list_all(&self) -> Result<Vec<OrderRecord>, ServiceError> {
        Ok(self.cache.list_all().await?)
    }

    /// Flip the collected flag and rebuild the board right away.
    ///
    /// Returns the new flag.
    pub async fn toggle_collected(&self, chk_num: &str) -> Result<bool, ServiceError> {
        let collected = self.cache.toggle_collected(chk_num).await?;
        info!(chk_num = %chk_num, collected, "Toggled collected flag");

        if let Err(e) = self.projector.refresh().await {
            warn!("Failed to rebuild snapshot after toggle: {}", e);
        }
        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service() -> (OrderService, OrderCache) {
        let cache = OrderCache::open_memory().await.unwrap();
        cache.ensure_table().await.unwrap();
        let projector = ViewProjector::new(cache.clone());
        (OrderService::new(cache.clone(), projector), cache)
    }

    #[tokio::test]
    async fn test_toggle_updates_snapshot_immediately() {
        let (service, cache) = service().await;
        cache.upsert_if_changed("12", 60).await.unwrap();
        cache.upsert_if_changed("13", 60).await.unwrap();

        assert!(service.toggle_collected("12").await.unwrap());
        assert_eq!(service.snapshot().ready_to_collect, vec!["13"]);

        assert!(!service.toggle_collected("12").await.unwrap());
        assert_eq!(service.snapshot().ready_to_collect, vec!["12", "13"]);
    }

    #[tokio::test]
    async fn test_toggle_unknown_order_is_not_found() {
        let (service, cache) = service().await;
        cache.upsert_if_changed("12", 60).await.unwrap();

        let err = service.toggle_collected("99").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let all = service.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].collected);
    }
}
