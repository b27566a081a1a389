//! v002: version records with half-open validity intervals.

use rusqlite::Connection;

use strata_core::StrataResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> StrataResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS entity_versions (
            version_id        INTEGER PRIMARY KEY AUTOINCREMENT,
            kind              TEXT NOT NULL,
            source_id         TEXT NOT NULL,
            source_id_type    TEXT NOT NULL,
            operation         TEXT NOT NULL CHECK (operation IN ('update', 'delete', 'insert')),
            valid_from        TEXT NOT NULL,
            valid_to          TEXT NOT NULL,
            correlation_id    TEXT NOT NULL,
            context           TEXT NOT NULL DEFAULT '{}',
            changed_fields    TEXT NOT NULL DEFAULT '{}',
            attributes        TEXT NOT NULL DEFAULT '{}',
            source_created_at TEXT,
            source_updated_at TEXT,
            recorded_at       TEXT NOT NULL,
            CHECK (valid_to > valid_from)
        );

        CREATE INDEX IF NOT EXISTS idx_versions_source_end
            ON entity_versions(kind, source_id, valid_to);
        CREATE INDEX IF NOT EXISTS idx_versions_kind_interval
            ON entity_versions(kind, valid_from, valid_to);
        CREATE INDEX IF NOT EXISTS idx_versions_correlation
            ON entity_versions(correlation_id);
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))
}
