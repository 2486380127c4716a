//! Order cache operations.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{Executor, Row};
use tracing::{debug, warn};

use crate::error::{DbError, Result};
use crate::types::*;
use crate::OrderCache;

/// Change-aware upsert. A conflicting row is only rewritten when its status
/// differs; `collected` is never touched.
const UPSERT_ORDER: &str = r#"
    INSERT INTO orders (chk_num, distribution_status, collected, timestamp)
    VALUES (?, ?, 0, CURRENT_TIMESTAMP)
    ON CONFLICT(chk_num) DO UPDATE SET
        distribution_status = excluded.distribution_status,
        timestamp = CURRENT_TIMESTAMP
    WHERE orders.distribution_status IS NOT excluded.distribution_status
"#;

const SELECT_ORDER_COLUMNS: &str =
    "SELECT chk_num, distribution_status, collected, timestamp FROM orders";

impl OrderCache {
    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert an order, or update its status when it changed.
    ///
    /// Returns whether a row was written.
    pub async fn upsert_if_changed(&self, chk_num: &str, distribution_status: i64) -> Result<bool> {
        upsert_row(&self.pool, chk_num, distribution_status).await
    }

    /// Apply [`OrderCache::upsert_if_changed`] to every update inside one
    /// transaction. Returns how many rows were written.
    pub async fn upsert_many(&self, updates: &[OrderUpdate]) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0;
        for update in updates {
            if upsert_row(&mut *tx, &update.chk_num, update.distribution_status).await? {
                written += 1;
            }
        }
        tx.commit().await?;

        debug!(received = updates.len(), written, "Merged order updates");
        Ok(written)
    }

    /// Set the collected flag of an order.
    ///
    /// Returns whether the stored flag changed. Fails with `NotFound` for an
    /// unknown check number.
    pub async fn set_collected(&self, chk_num: &str, collected: bool) -> Result<bool> {
        let flag = i64::from(collected);
        let result = sqlx::query(
            "UPDATE orders SET collected = ? WHERE chk_num = ? AND COALESCE(collected, 0) != ?",
        )
        .bind(flag)
        .bind(chk_num)
        .bind(flag)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists: Option<(String,)> = sqlx::query_as("SELECT chk_num FROM orders WHERE chk_num = ?")
            .bind(chk_num)
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Ok(false),
            None => Err(DbError::not_found(format!("Order {}", chk_num))),
        }
    }

    /// Flip the collected flag of an order and return the new value.
    pub async fn toggle_collected(&self, chk_num: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE orders
            SET collected = CASE WHEN COALESCE(collected, 0) = 0 THEN 1 ELSE 0 END
            WHERE chk_num = ?
            RETURNING collected
            "#,
        )
        .bind(chk_num)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((flag,)) => Ok(flag != 0),
            None => Err(DbError::not_found(format!("Order {}", chk_num))),
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Get one order by check number.
    pub async fn get(&self, chk_num: &str) -> Result<Option<OrderRecord>> {
        let sql = format!("{} WHERE chk_num = ?", SELECT_ORDER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(chk_num)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    /// All orders whose status code is in `codes`.
    pub async fn list_active(&self, codes: &[i64]) -> Result<Vec<OrderRecord>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; codes.len()].join(", ");
        let sql = format!(
            "{} WHERE distribution_status IN ({})",
            SELECT_ORDER_COLUMNS, placeholders
        );

        let mut query = sqlx::query(&sql);
        for code in codes {
            query = query.bind(*code);
        }

        let rows = query.fetch_all(&self.pool).await?;
        collect_readable(&rows)
    }

    /// Every cached order, ordered by check number.
    pub async fn list_all(&self) -> Result<Vec<OrderRecord>> {
        let sql = format!("{} ORDER BY chk_num ASC", SELECT_ORDER_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        collect_readable(&rows)
    }

    /// Most recent write time across all orders, `None` when the cache is empty.
    pub async fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        let (latest,): (Option<String>,) = sqlx::query_as("SELECT MAX(timestamp) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        latest.as_deref().map(parse_cache_timestamp).transpose()
    }
}

async fn upsert_row<'e, E>(executor: E, chk_num: &str, distribution_status: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(UPSERT_ORDER)
        .bind(chk_num)
        .bind(distribution_status)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Maps listed rows, skipping any whose stored values cannot be read back.
fn collect_readable(rows: &[SqliteRow]) -> Result<Vec<OrderRecord>> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        match row_to_record(row) {
            Ok(record) => records.push(record),
            Err(DbError::InvalidState(msg)) => warn!("Skipping unreadable cached order: {}", msg),
            Err(e) => return Err(e),
        }
    }
    Ok(records)
}

fn row_to_record(row: &SqliteRow) -> Result<OrderRecord> {
    let chk_num: String = row.try_get("chk_num")?;
    let status: Option<i64> = row.try_get("distribution_status")?;
    let collected: Option<i64> = row.try_get("collected")?;
    let timestamp: Option<String> = row.try_get("timestamp")?;

    let distribution_status = status.ok_or_else(|| {
        DbError::invalid_state(format!("Order {} has no distribution status", chk_num))
    })?;
    let timestamp = timestamp
        .as_deref()
        .map(parse_cache_timestamp)
        .transpose()?
        .ok_or_else(|| DbError::invalid_state(format!("Order {} has no timestamp", chk_num)))?;

    Ok(OrderRecord {
        chk_num,
        distribution_status,
        collected: collected.unwrap_or(0) != 0,
        timestamp,
    })
}
