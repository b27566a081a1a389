//! Raw SQL operations for the live_entities table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use strata_core::models::{EntityId, EntityRecord};
use strata_core::StrataResult;

use super::{parse_attributes, parse_opt_ts};
use crate::{fmt_ts, to_storage_err};

const COLUMNS: &str = "kind, entity_id, entity_id_type, attributes, created_at, updated_at";

/// Raw live row from the database.
#[derive(Debug, Clone)]
pub struct RawEntity {
    pub kind: String,
    pub entity_id: String,
    pub entity_id_type: String,
    pub attributes: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl RawEntity {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            kind: row.get(0)?,
            entity_id: row.get(1)?,
            entity_id_type: row.get(2)?,
            attributes: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    pub fn into_record(self) -> StrataResult<EntityRecord> {
        Ok(EntityRecord {
            id: EntityId::from_parts(&self.entity_id_type, &self.entity_id)?,
            attributes: parse_attributes("live_entities.attributes", &self.attributes)?,
            created_at: parse_opt_ts(self.created_at)?,
            updated_at: parse_opt_ts(self.updated_at)?,
            kind: self.kind,
        })
    }
}

fn encode_attributes(record: &EntityRecord) -> StrataResult<String> {
    Ok(serde_json::to_string(&record.attributes)?)
}

pub fn insert_entity(conn: &Connection, record: &EntityRecord) -> StrataResult<()> {
    conn.execute(
        "INSERT INTO live_entities
            (kind, entity_id, entity_id_type, attributes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.kind,
            record.id.key(),
            record.id.type_tag(),
            encode_attributes(record)?,
            record.created_at.map(fmt_ts),
            record.updated_at.map(fmt_ts),
        ],
    )
    .map_err(|e| to_storage_err(format!("insert {}#{}: {e}", record.kind, record.id)))?;
    Ok(())
}

/// Overwrite attributes and timestamps of an existing row. Returns rows touched.
pub fn update_entity(conn: &Connection, record: &EntityRecord) -> StrataResult<usize> {
    conn.execute(
        "UPDATE live_entities
            SET attributes = ?3, created_at = ?4, updated_at = ?5
          WHERE kind = ?1 AND entity_id = ?2",
        params![
            record.kind,
            record.id.key(),
            encode_attributes(record)?,
            record.created_at.map(fmt_ts),
            record.updated_at.map(fmt_ts),
        ],
    )
    .map_err(|e| to_storage_err(format!("update {}#{}: {e}", record.kind, record.id)))
}

pub fn get_entity(conn: &Connection, kind: &str, id: &EntityId) -> StrataResult<Option<EntityRecord>> {
    let sql = format!("SELECT {COLUMNS} FROM live_entities WHERE kind = ?1 AND entity_id = ?2");
    conn.query_row(&sql, params![kind, id.key()], RawEntity::from_row)
        .optional()
        .map_err(|e| to_storage_err(e.to_string()))?
        .map(RawEntity::into_record)
        .transpose()
}

/// Returns true when a row was removed.
pub fn delete_entity(conn: &Connection, kind: &str, id: &EntityId) -> StrataResult<bool> {
    let removed = conn
        .execute(
            "DELETE FROM live_entities WHERE kind = ?1 AND entity_id = ?2",
            params![kind, id.key()],
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(removed > 0)
}

/// All live rows of a kind in insertion order.
pub fn list_entities(conn: &Connection, kind: &str) -> StrataResult<Vec<EntityRecord>> {
    let sql = format!("SELECT {COLUMNS} FROM live_entities WHERE kind = ?1 ORDER BY rowid");
    query_entities(conn, &sql, params![kind])
}

/// Live rows of a kind, optionally narrowed to one id.
pub fn live_entities(
    conn: &Connection,
    kind: &str,
    id: Option<&EntityId>,
) -> StrataResult<Vec<EntityRecord>> {
    match id {
        Some(id) => Ok(get_entity(conn, kind, id)?.into_iter().collect()),
        None => list_entities(conn, kind),
    }
}

/// Live rows of `kind` whose `foreign_key` attribute references `parent`.
pub fn find_children(
    conn: &Connection,
    kind: &str,
    foreign_key: &str,
    parent: &EntityId,
) -> StrataResult<Vec<EntityRecord>> {
    let path = json_path(foreign_key);
    let sql = format!(
        "SELECT {COLUMNS} FROM live_entities
          WHERE kind = ?1 AND json_extract(attributes, ?2) = ?3
          ORDER BY rowid"
    );
    match parent {
        EntityId::Integer(i) => query_entities(conn, &sql, params![kind, path, i]),
        other => query_entities(conn, &sql, params![kind, path, other.key()]),
    }
}

fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

fn query_entities(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> StrataResult<Vec<EntityRecord>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params, RawEntity::from_row)
        .map_err(|e| to_storage_err(e.to_string()))?;

    let mut records = Vec::new();
    for row in rows {
        let raw = row.map_err(|e| to_storage_err(e.to_string()))?;
        records.push(raw.into_record()?);
    }
    Ok(records)
}
