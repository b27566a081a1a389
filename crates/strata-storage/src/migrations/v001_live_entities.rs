//! v001: the live set.

use rusqlite::Connection;

use strata_core::StrataResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> StrataResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS live_entities (
            kind           TEXT NOT NULL,
            entity_id      TEXT NOT NULL,
            entity_id_type TEXT NOT NULL,
            attributes     TEXT NOT NULL DEFAULT '{}',
            created_at     TEXT,
            updated_at     TEXT,
            PRIMARY KEY (kind, entity_id)
        );

        CREATE INDEX IF NOT EXISTS idx_live_kind_created
            ON live_entities(kind, created_at);
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))
}
