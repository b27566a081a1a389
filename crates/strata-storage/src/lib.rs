//! # strata-storage
//!
//! SQLite persistence collaborator for Strata.
//! Implements `IVersionStore`: live rows and version records in one
//! database, single serialized write connection + read pool (WAL mode).

pub mod engine;
pub mod migrations;
pub mod pool;
pub mod queries;

use chrono::{DateTime, SecondsFormat, Utc};

pub use engine::{SqliteTx, StorageEngine};

/// Helper to convert a string message into a `StrataError::StorageError`.
pub fn to_storage_err(msg: String) -> strata_core::StrataError {
    strata_core::StrataError::StorageError(strata_core::errors::StorageError::SqliteError {
        message: msg,
    })
}

/// Fixed-width RFC 3339 with microseconds, so text order is time order.
pub fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(s: &str) -> Result<DateTime<Utc>, strata_core::errors::StorageError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| strata_core::errors::StorageError::Corrupt {
            message: format!("timestamp {s:?}: {e}"),
        })
}
