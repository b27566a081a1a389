//! Raw SQL operations for the entity_versions table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use strata_core::errors::StorageError;
use strata_core::models::{
    ContextSnapshot, EntityId, Validity, VersionId, VersionOperation, VersionRecord,
};
use strata_core::{StrataError, StrataResult};

use super::{parse_attributes, parse_opt_ts};
use crate::{fmt_ts, parse_ts, to_storage_err};

const COLUMNS: &str = "version_id, kind, source_id, source_id_type, operation, valid_from, \
     valid_to, correlation_id, context, changed_fields, attributes, source_created_at, \
     source_updated_at, recorded_at";

/// Raw version row from the database.
#[derive(Debug, Clone)]
pub struct RawVersion {
    pub version_id: i64,
    pub kind: String,
    pub source_id: String,
    pub source_id_type: String,
    pub operation: String,
    pub valid_from: String,
    pub valid_to: String,
    pub correlation_id: String,
    pub context: String,
    pub changed_fields: String,
    pub attributes: String,
    pub source_created_at: Option<String>,
    pub source_updated_at: Option<String>,
    pub recorded_at: String,
}

impl RawVersion {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            version_id: row.get(0)?,
            kind: row.get(1)?,
            source_id: row.get(2)?,
            source_id_type: row.get(3)?,
            operation: row.get(4)?,
            valid_from: row.get(5)?,
            valid_to: row.get(6)?,
            correlation_id: row.get(7)?,
            context: row.get(8)?,
            changed_fields: row.get(9)?,
            attributes: row.get(10)?,
            source_created_at: row.get(11)?,
            source_updated_at: row.get(12)?,
            recorded_at: row.get(13)?,
        })
    }

    pub fn into_record(self) -> StrataResult<VersionRecord> {
        let correlation_id = Uuid::parse_str(&self.correlation_id).map_err(|e| {
            StrataError::StorageError(StorageError::Corrupt {
                message: format!("correlation_id {:?}: {e}", self.correlation_id),
            })
        })?;
        let context: ContextSnapshot = serde_json::from_str(&self.context).map_err(|e| {
            StrataError::StorageError(StorageError::Corrupt {
                message: format!("entity_versions.context: {e}"),
            })
        })?;

        Ok(VersionRecord {
            version_id: Some(VersionId(self.version_id)),
            source_id: EntityId::from_parts(&self.source_id_type, &self.source_id)?,
            operation: self.operation.parse::<VersionOperation>()?,
            validity: Validity::new(parse_ts(&self.valid_from)?, parse_ts(&self.valid_to)?),
            correlation_id,
            context,
            changed_fields: parse_attributes("entity_versions.changed_fields", &self.changed_fields)?,
            snapshot: parse_attributes("entity_versions.attributes", &self.attributes)?,
            source_created_at: parse_opt_ts(self.source_created_at)?,
            source_updated_at: parse_opt_ts(self.source_updated_at)?,
            recorded_at: parse_ts(&self.recorded_at)?,
            kind: self.kind,
        })
    }
}

/// Insert a version. Returns the assigned version_id.
pub fn insert_version(conn: &Connection, version: &VersionRecord) -> StrataResult<VersionId> {
    conn.execute(
        "INSERT INTO entity_versions
            (kind, source_id, source_id_type, operation, valid_from, valid_to, correlation_id,
             context, changed_fields, attributes, source_created_at, source_updated_at, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            version.kind,
            version.source_id.key(),
            version.source_id.type_tag(),
            version.operation.as_str(),
            fmt_ts(version.validity.start),
            fmt_ts(version.validity.end),
            version.correlation_id.hyphenated().to_string(),
            serde_json::to_string(&version.context)?,
            serde_json::to_string(&version.changed_fields)?,
            serde_json::to_string(&version.snapshot)?,
            version.source_created_at.map(fmt_ts),
            version.source_updated_at.map(fmt_ts),
            fmt_ts(version.recorded_at),
        ],
    )
    .map_err(|e| {
        to_storage_err(format!(
            "insert {} version of {}#{}: {e}",
            version.operation, version.kind, version.source_id
        ))
    })?;

    Ok(VersionId(conn.last_insert_rowid()))
}

pub fn get_version(conn: &Connection, version_id: VersionId) -> StrataResult<Option<VersionRecord>> {
    let sql = format!("SELECT {COLUMNS} FROM entity_versions WHERE version_id = ?1");
    conn.query_row(&sql, params![version_id.0], RawVersion::from_row)
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?
        .map(RawVersion::into_record)
        .transpose()
}

/// The version with the latest end; ties go to the later insert.
pub fn most_recent(
    conn: &Connection,
    kind: &str,
    id: &EntityId,
) -> StrataResult<Option<VersionRecord>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM entity_versions
          WHERE kind = ?1 AND source_id = ?2
          ORDER BY valid_to DESC, version_id DESC
          LIMIT 1"
    );
    conn.query_row(&sql, params![kind, id.key()], RawVersion::from_row)
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?
        .map(RawVersion::into_record)
        .transpose()
}

/// The version of one entity whose interval contains `at`.
pub fn version_at(
    conn: &Connection,
    kind: &str,
    id: &EntityId,
    at: DateTime<Utc>,
) -> StrataResult<Option<VersionRecord>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM entity_versions
          WHERE kind = ?1 AND source_id = ?2 AND valid_from <= ?3 AND valid_to > ?3
          ORDER BY version_id DESC
          LIMIT 1"
    );
    conn.query_row(&sql, params![kind, id.key(), fmt_ts(at)], RawVersion::from_row)
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?
        .map(RawVersion::into_record)
        .transpose()
}

/// Full history of one entity, oldest first.
pub fn history(conn: &Connection, kind: &str, id: &EntityId) -> StrataResult<Vec<VersionRecord>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM entity_versions
          WHERE kind = ?1 AND source_id = ?2
          ORDER BY valid_from ASC, version_id ASC"
    );
    query_versions(conn, &sql, params![kind, id.key()])
}

/// Versions of a kind whose interval contains `at`, optionally for one id.
pub fn covering(
    conn: &Connection,
    kind: &str,
    at: DateTime<Utc>,
    id: Option<&EntityId>,
) -> StrataResult<Vec<VersionRecord>> {
    let at = fmt_ts(at);
    match id {
        Some(id) => {
            let sql = format!(
                "SELECT {COLUMNS} FROM entity_versions
                  WHERE kind = ?1 AND source_id = ?2 AND valid_from <= ?3 AND valid_to > ?3
                  ORDER BY version_id ASC"
            );
            query_versions(conn, &sql, params![kind, id.key(), at])
        }
        None => {
            let sql = format!(
                "SELECT {COLUMNS} FROM entity_versions
                  WHERE kind = ?1 AND valid_from <= ?2 AND valid_to > ?2
                  ORDER BY version_id ASC"
            );
            query_versions(conn, &sql, params![kind, at])
        }
    }
}

/// Every version written under one correlation id, in write order.
pub fn by_correlation(conn: &Connection, correlation_id: Uuid) -> StrataResult<Vec<VersionRecord>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM entity_versions
          WHERE correlation_id = ?1
          ORDER BY version_id ASC"
    );
    query_versions(conn, &sql, params![correlation_id.hyphenated().to_string()])
}

/// Remove the whole history of one entity. Returns rows deleted.
pub fn delete_for_source(conn: &Connection, kind: &str, id: &EntityId) -> StrataResult<usize> {
    conn.execute(
        "DELETE FROM entity_versions WHERE kind = ?1 AND source_id = ?2",
        params![kind, id.key()],
    )
    .map_err(|e| to_storage_err(e.to_string()))
}

/// Delete versions that close the history of a source that has no live row.
pub fn trashed(conn: &Connection, kind: &str) -> StrataResult<Vec<VersionRecord>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM entity_versions v
          WHERE v.kind = ?1
            AND v.operation = 'delete'
            AND v.version_id = (
                SELECT latest.version_id FROM entity_versions latest
                 WHERE latest.kind = v.kind AND latest.source_id = v.source_id
                 ORDER BY latest.valid_to DESC, latest.version_id DESC
                 LIMIT 1)
            AND NOT EXISTS (
                SELECT 1 FROM live_entities l
                 WHERE l.kind = v.kind AND l.entity_id = v.source_id)
          ORDER BY v.valid_to ASC, v.version_id ASC"
    );
    query_versions(conn, &sql, params![kind])
}

fn query_versions(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> StrataResult<Vec<VersionRecord>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params, RawVersion::from_row)
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut versions = Vec::new();
    for row in rows {
        let raw = row.map_err(|e| to_storage_err(e.to_string()))?;
        versions.push(raw.into_record()?);
    }
    Ok(versions)
}
