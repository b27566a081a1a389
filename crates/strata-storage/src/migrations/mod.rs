//! Schema migrations.
//!
//! Applied in order, each inside its own `IMMEDIATE` transaction together
//! with its `schema_version` row, so a crash leaves either the whole step or
//! none of it. A database stamped with a newer version than this build knows
//! is refused rather than written to.

mod v001_live_entities;
mod v002_entity_versions;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info, warn};

use strata_core::errors::StorageError;
use strata_core::StrataResult;

use crate::to_storage_err;

/// Schema version produced by a full run.
pub const LATEST_VERSION: u32 = 2;

struct Migration {
    version: u32,
    name: &'static str,
    apply: fn(&Connection) -> StrataResult<()>,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "live_entities",
        apply: v001_live_entities::migrate,
    },
    Migration {
        version: 2,
        name: "entity_versions",
        apply: v002_entity_versions::migrate,
    },
];

/// Highest applied version, 0 for a database never migrated.
pub fn current_version(conn: &Connection) -> StrataResult<u32> {
    let version = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<u32>>(0)
    });
    match version {
        Ok(version) => Ok(version.unwrap_or(0)),
        Err(rusqlite::Error::SqliteFailure(_, Some(msg))) if msg.contains("no such table") => Ok(0),
        Err(e) => Err(to_storage_err(format!("read schema version: {e}"))),
    }
}

/// Bring the schema up to [`LATEST_VERSION`]. Returns how many steps ran.
pub fn run_migrations(conn: &Connection) -> StrataResult<u32> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            name       TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );",
    )
    .map_err(|e| to_storage_err(format!("create schema_version: {e}")))?;

    let from = current_version(conn)?;
    if from > LATEST_VERSION {
        return Err(StorageError::MigrationFailed {
            version: from,
            reason: format!("database schema is newer than this build (v{LATEST_VERSION})"),
        }
        .into());
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > from).collect();
    if pending.is_empty() {
        debug!(version = from, "schema up to date");
        return Ok(0);
    }
    info!(from, to = LATEST_VERSION, steps = pending.len(), "migrating schema");

    for migration in &pending {
        apply_one(conn, migration).map_err(|e| {
            warn!(version = migration.version, name = migration.name, error = %e, "migration rolled back");
            StorageError::MigrationFailed {
                version: migration.version,
                reason: e.to_string(),
            }
        })?;
        debug!(version = migration.version, name = migration.name, "migration applied");
    }

    Ok(pending.len() as u32)
}

/// Dropping the transaction on any error rolls the step back.
fn apply_one(conn: &Connection, migration: &Migration) -> StrataResult<()> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(|e| to_storage_err(e.to_string()))?;
    (migration.apply)(&tx)?;
    tx.execute(
        "INSERT INTO schema_version (version, name) VALUES (?1, ?2)",
        rusqlite::params![migration.version, migration.name],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    tx.commit().map_err(|e| to_storage_err(e.to_string()))
}
