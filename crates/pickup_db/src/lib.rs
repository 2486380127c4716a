//! Local order cache for the pickup board.
//!
//! A single SQLite table keyed by check number holds the last status seen from
//! the point-of-sale database plus the user-maintained collected flag. Every
//! statement that touches the table lives in this crate.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pickup_db::{OrderCache, Result};
//!
//! let cache = OrderCache::open("orders.db").await?;
//! cache.ensure_table().await?;
//!
//! let written = cache.upsert_if_changed("1042", 50).await?;
//! let flag = cache.toggle_collected("1042").await?;
//! ```

mod error;
mod orders;
mod schema;
mod types;

pub use error::{DbError, Result};
pub use schema::ORDERS_TABLE;
pub use types::*;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the order cache.
///
/// Cheap to clone; all clones share one connection pool. This is the only way
/// to reach the `orders` table, do not use raw sqlx elsewhere.
#[derive(Clone)]
pub struct OrderCache {
    pool: SqlitePool,
    reset_lock: Arc<Mutex<()>>,
}

impl OrderCache {
    /// Open or create a cache database at the given path.
    ///
    /// The `orders` table is not created here; see [`OrderCache::ensure_table`]
    /// and [`OrderCache::reset_all`].
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        info!(path = %path.display(), "Order cache opened");

        Ok(Self::from_pool(pool))
    }

    /// Open a private in-memory cache.
    ///
    /// Backed by a single connection so every caller sees the same database.
    pub async fn open_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self::from_pool(pool))
    }

    fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            reset_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Get the underlying connection pool (escape hatch for diagnostics and tests).
    ///
    /// Prefer using the typed methods instead.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}
