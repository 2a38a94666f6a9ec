//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row`.  Timestamps are stored as RFC 3339 TEXT; every writer
//! goes through [`fmt_ts`] so the stored strings compare consistently.

use chrono::{DateTime, Utc};
use shift_core::{OrderId, TaskId, TaskStatus, TaskType};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

/// Format a timestamp for storage.
pub fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn conversion_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

/// Parse a UUID-based ID from a text column.
fn parse_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    let uuid = Uuid::parse_str(&s).map_err(|e| conversion_err(idx, e))?;
    Ok(T::from(uuid))
}

/// Parse an RFC 3339 timestamp from a text column.
fn parse_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

fn parse_opt_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let s: Option<String> = row.get(idx)?;
    match s {
        Some(v) => DateTime::parse_from_rfc3339(&v)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| conversion_err(idx, e)),
        None => Ok(None),
    }
}

fn parse_enum<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let s: String = row.get(idx)?;
    s.parse().map_err(|e: T::Err| {
        conversion_err(idx, std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    })
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A conversion task row.
#[derive(Debug, Clone)]
pub struct Task {
    pub task_id: TaskId,
    pub client_id: String,
    pub file_name: String,
    /// Declared source size in bytes.
    pub file_size: i64,
    pub source_key: String,
    /// Set exactly when `status` is completed.
    pub result_key: Option<String>,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub is_paid: bool,
    /// Non-empty exactly when `status` is failed.
    pub error_msg: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Fixed at creation; never extended or recomputed.
    pub expire_at: DateTime<Utc>,
}

impl Task {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            task_id: parse_id(row, 0)?,
            client_id: row.get(1)?,
            file_name: row.get(2)?,
            file_size: row.get(3)?,
            source_key: row.get(4)?,
            result_key: row.get(5)?,
            task_type: parse_enum(row, 6)?,
            status: parse_enum(row, 7)?,
            is_paid: row.get(8)?,
            error_msg: row.get(9)?,
            created_at: parse_ts(row, 10)?,
            completed_at: parse_opt_ts(row, 11)?,
            expire_at: parse_ts(row, 12)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// A payment order row.
///
/// `status` is one of `unpaid`, `paid`, `refunded`.
#[derive(Debug, Clone)]
pub struct Order {
    pub order_id: OrderId,
    pub client_id: String,
    pub source_key: String,
    /// Amount in the smallest currency unit.
    pub amount: i64,
    pub status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            order_id: parse_id(row, 0)?,
            client_id: row.get(1)?,
            source_key: row.get(2)?,
            amount: row.get(3)?,
            status: row.get(4)?,
            paid_at: parse_opt_ts(row, 5)?,
            created_at: parse_ts(row, 6)?,
        })
    }
}
