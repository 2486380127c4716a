//! Schema creation and the full-table reset.
//!
//! The column layout and defaults are read directly by external dashboards;
//! keep them stable.

use crate::error::Result;
use crate::OrderCache;
use tracing::info;

/// Name of the cache table.
pub const ORDERS_TABLE: &str = "orders";

const CREATE_ORDERS_TABLE: &str = r#"CREATE TABLE orders (
    chk_num TEXT PRIMARY KEY,
    distribution_status INTEGER,
    collected INTEGER DEFAULT 0,
    timestamp TEXT DEFAULT CURRENT_TIMESTAMP
)"#;

const CREATE_ORDERS_TABLE_IF_MISSING: &str = r#"CREATE TABLE IF NOT EXISTS orders (
    chk_num TEXT PRIMARY KEY,
    distribution_status INTEGER,
    collected INTEGER DEFAULT 0,
    timestamp TEXT DEFAULT CURRENT_TIMESTAMP
)"#;

impl OrderCache {
    /// Whether the `orders` table exists.
    pub async fn table_exists(&self) -> Result<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(ORDERS_TABLE)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Create the `orders` table if it does not exist yet. Existing rows are kept.
    pub async fn ensure_table(&self) -> Result<()> {
        sqlx::query(CREATE_ORDERS_TABLE_IF_MISSING)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drop and recreate the `orders` table, destroying every record.
    ///
    /// Runs as one transaction so concurrent readers see either the old table
    /// or the new empty one. Resets never overlap each other.
    pub async fn reset_all(&self) -> Result<()> {
        let _guard = self.reset_lock.lock().await;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DROP TABLE IF EXISTS orders")
            .execute(&mut *tx)
            .await?;
        sqlx::query(CREATE_ORDERS_TABLE).execute(&mut *tx).await?;
        tx.commit().await?;

        info!("Order cache table '{}' has been reset", ORDERS_TABLE);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::OrderCache;

    #[tokio::test]
    async fn test_ensure_table_keeps_rows() {
        let cache = OrderCache::open_memory().await.unwrap();
        cache.ensure_table().await.unwrap();
        cache.upsert_if_changed("1", 50).await.unwrap();

        cache.ensure_table().await.unwrap();
        assert_eq!(cache.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_creates_missing_table() {
        let cache = OrderCache::open_memory().await.unwrap();
        assert!(!cache.table_exists().await.unwrap());

        cache.reset_all().await.unwrap();
        assert!(cache.table_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_reset_restores_column_defaults() {
        let cache = OrderCache::open_memory().await.unwrap();
        cache.reset_all().await.unwrap();

        sqlx::query("INSERT INTO orders (chk_num, distribution_status) VALUES ('9', 60)")
            .execute(cache.pool())
            .await
            .unwrap();

        let record = cache.get("9").await.unwrap().unwrap();
        assert!(!record.collected);
        assert_eq!(record.distribution_status, 60);
    }
}
