//! Types stored in and read from the order cache.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Serialize, Serializer};

use crate::error::{DbError, Result};

/// One cached order, keyed by check number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRecord {
    /// Check number from the point-of-sale system
    pub chk_num: String,
    /// Distribution status code last seen at the source
    pub distribution_status: i64,
    /// Set by staff when the order has been handed over
    #[serde(serialize_with = "bool_as_int")]
    pub collected: bool,
    /// When the status was last written
    #[serde(serialize_with = "cache_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// A status observation to merge into the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpdate {
    pub chk_num: String,
    pub distribution_status: i64,
}

impl OrderUpdate {
    pub fn new(chk_num: impl Into<String>, distribution_status: i64) -> Self {
        Self {
            chk_num: chk_num.into(),
            distribution_status,
        }
    }
}

const SQLITE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a timestamp as written by SQLite's `CURRENT_TIMESTAMP` (UTC).
///
/// RFC3339 strings with an explicit offset are accepted as well, for rows
/// written by other tools.
pub fn parse_cache_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    for format in SQLITE_TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::invalid_state(format!("Invalid timestamp '{}': {}", value, e)))
}

/// Format a timestamp the way SQLite's `CURRENT_TIMESTAMP` does.
pub fn format_cache_timestamp(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn bool_as_int<S: Serializer>(value: &bool, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*value))
}

fn cache_timestamp<S: Serializer>(
    value: &DateTime<Utc>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_cache_timestamp(value))
}
