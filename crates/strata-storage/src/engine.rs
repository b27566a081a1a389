//! `StorageEngine`: the SQLite implementation of `IVersionStore`.
//!
//! Writes go through the single write connection; a `SqliteTx` holds its
//! lock for the life of the transaction. Committed reads go through the
//! read pool, or through the writer when the database is in memory.

use std::path::{Path, PathBuf};
use std::sync::MutexGuard;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, warn};
use uuid::Uuid;

use strata_core::config::StorageConfig;
use strata_core::models::{EntityId, EntityRecord, VersionId, VersionRecord};
use strata_core::traits::{IVersionStore, PointInTime};
use strata_core::StrataResult;

use crate::migrations;
use crate::pool::{ReadPool, WriteConnection};
use crate::queries::{entity_ops, version_ops};
use crate::to_storage_err;

pub struct StorageEngine {
    writer: WriteConnection,
    readers: Option<ReadPool>,
    path: Option<PathBuf>,
}

impl StorageEngine {
    /// Open a file-backed engine. Runs pending migrations.
    pub fn open(path: &Path, config: &StorageConfig) -> StrataResult<Self> {
        let writer = WriteConnection::open(path, config)?;
        writer.with_conn(|conn| migrations::run_migrations(conn).map(|_| ()))?;
        let readers = ReadPool::open(path, config)?;
        debug!(
            path = %path.display(),
            readers = readers.size(),
            "opened storage engine"
        );
        Ok(Self {
            writer,
            readers: Some(readers),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory engine (for testing). Reads share the write connection.
    pub fn open_in_memory() -> StrataResult<Self> {
        let writer = WriteConnection::open_in_memory(&StorageConfig::default())?;
        writer.with_conn(|conn| migrations::run_migrations(conn).map(|_| ()))?;
        Ok(Self {
            writer,
            readers: None,
            path: None,
        })
    }

    /// Database file path (None for in-memory).
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Truncating WAL checkpoint. No-op in memory.
    pub fn checkpoint(&self) -> StrataResult<()> {
        if self.path.is_none() {
            return Ok(());
        }
        self.writer.with_conn(|conn| {
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
                .map_err(|e| to_storage_err(format!("checkpoint: {e}")))
        })
    }

    /// Raw read access against committed data.
    pub fn with_reader<F, T>(&self, f: F) -> StrataResult<T>
    where
        F: FnOnce(&Connection) -> StrataResult<T>,
    {
        match &self.readers {
            Some(pool) => pool.with_conn(f),
            None => self.writer.with_conn(f),
        }
    }

    /// Raw write access outside of any `SqliteTx`.
    pub fn with_writer<F, T>(&self, f: F) -> StrataResult<T>
    where
        F: FnOnce(&Connection) -> StrataResult<T>,
    {
        self.writer.with_conn(f)
    }
}

/// An open write transaction. Dropping it without `commit` rolls back.
pub struct SqliteTx<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl<'a> SqliteTx<'a> {
    fn begin(conn: MutexGuard<'a, Connection>) -> StrataResult<Self> {
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| to_storage_err(format!("begin transaction: {e}")))?;
        Ok(Self {
            conn,
            finished: false,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// A failed COMMIT leaves `finished` unset so drop still rolls back.
    fn finish(mut self, statement: &str) -> StrataResult<()> {
        self.conn
            .execute_batch(statement)
            .map_err(|e| to_storage_err(format!("{statement}: {e}")))?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteTx<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!("rollback of abandoned transaction failed: {e}");
            }
        }
    }
}

impl IVersionStore for StorageEngine {
    type Tx<'a> = SqliteTx<'a>;

    fn begin(&self) -> StrataResult<SqliteTx<'_>> {
        SqliteTx::begin(self.writer.lock()?)
    }

    fn commit(&self, tx: SqliteTx<'_>) -> StrataResult<()> {
        tx.finish("COMMIT")
    }

    fn rollback(&self, tx: SqliteTx<'_>) -> StrataResult<()> {
        tx.finish("ROLLBACK")
    }

    fn current_persisted(
        &self,
        tx: &mut SqliteTx<'_>,
        kind: &str,
        id: &EntityId,
    ) -> StrataResult<Option<EntityRecord>> {
        entity_ops::get_entity(tx.conn(), kind, id)
    }

    fn insert_live(&self, tx: &mut SqliteTx<'_>, record: &EntityRecord) -> StrataResult<()> {
        entity_ops::insert_entity(tx.conn(), record)
    }

    fn update_live(&self, tx: &mut SqliteTx<'_>, record: &EntityRecord) -> StrataResult<()> {
        let touched = entity_ops::update_entity(tx.conn(), record)?;
        if touched == 0 {
            return Err(strata_core::StrataError::EntityNotFound {
                kind: record.kind.clone(),
                id: record.id.to_string(),
            });
        }
        Ok(())
    }

    fn remove_from_live_set(
        &self,
        tx: &mut SqliteTx<'_>,
        kind: &str,
        id: &EntityId,
    ) -> StrataResult<bool> {
        entity_ops::delete_entity(tx.conn(), kind, id)
    }

    fn reinsert_into_live_set(
        &self,
        tx: &mut SqliteTx<'_>,
        record: &EntityRecord,
    ) -> StrataResult<()> {
        entity_ops::insert_entity(tx.conn(), record)
    }

    fn find_live_children(
        &self,
        tx: &mut SqliteTx<'_>,
        kind: &str,
        foreign_key: &str,
        parent: &EntityId,
    ) -> StrataResult<Vec<EntityRecord>> {
        entity_ops::find_children(tx.conn(), kind, foreign_key, parent)
    }

    fn load_most_recent_version(
        &self,
        tx: &mut SqliteTx<'_>,
        kind: &str,
        id: &EntityId,
    ) -> StrataResult<Option<VersionRecord>> {
        version_ops::most_recent(tx.conn(), kind, id)
    }

    fn version_at(
        &self,
        tx: &mut SqliteTx<'_>,
        kind: &str,
        id: &EntityId,
        at: DateTime<Utc>,
    ) -> StrataResult<Option<VersionRecord>> {
        version_ops::version_at(tx.conn(), kind, id, at)
    }

    fn persist_version(
        &self,
        tx: &mut SqliteTx<'_>,
        version: &VersionRecord,
    ) -> StrataResult<VersionRecord> {
        let version_id = version_ops::insert_version(tx.conn(), version)?;
        let mut persisted = version.clone();
        persisted.version_id = Some(version_id);
        Ok(persisted)
    }

    fn purge_versions(
        &self,
        tx: &mut SqliteTx<'_>,
        kind: &str,
        id: &EntityId,
    ) -> StrataResult<usize> {
        version_ops::delete_for_source(tx.conn(), kind, id)
    }

    fn versions_by_correlation(
        &self,
        tx: &mut SqliteTx<'_>,
        correlation_id: Uuid,
    ) -> StrataResult<Vec<VersionRecord>> {
        version_ops::by_correlation(tx.conn(), correlation_id)
    }

    fn find_live(&self, kind: &str, id: &EntityId) -> StrataResult<Option<EntityRecord>> {
        self.with_reader(|conn| entity_ops::get_entity(conn, kind, id))
    }

    fn list_live(&self, kind: &str) -> StrataResult<Vec<EntityRecord>> {
        self.with_reader(|conn| entity_ops::list_entities(conn, kind))
    }

    fn get_version(&self, version_id: VersionId) -> StrataResult<Option<VersionRecord>> {
        self.with_reader(|conn| version_ops::get_version(conn, version_id))
    }

    fn versions_for(&self, kind: &str, id: &EntityId) -> StrataResult<Vec<VersionRecord>> {
        self.with_reader(|conn| version_ops::history(conn, kind, id))
    }

    fn most_recent_version(
        &self,
        kind: &str,
        id: &EntityId,
    ) -> StrataResult<Option<VersionRecord>> {
        self.with_reader(|conn| version_ops::most_recent(conn, kind, id))
    }

    fn point_in_time(
        &self,
        kind: &str,
        at: DateTime<Utc>,
        id: Option<&EntityId>,
    ) -> StrataResult<PointInTime> {
        self.with_reader(|conn| {
            let read = conn
                .unchecked_transaction()
                .map_err(|e| to_storage_err(format!("begin read: {e}")))?;
            let live = entity_ops::live_entities(&read, kind, id)?;
            let covering = version_ops::covering(&read, kind, at, id)?;
            read.commit()
                .map_err(|e| to_storage_err(format!("end read: {e}")))?;
            Ok(PointInTime { live, covering })
        })
    }

    fn versions_with_correlation(&self, correlation_id: Uuid) -> StrataResult<Vec<VersionRecord>> {
        self.with_reader(|conn| version_ops::by_correlation(conn, correlation_id))
    }

    fn trashed_versions(&self, kind: &str) -> StrataResult<Vec<VersionRecord>> {
        self.with_reader(|conn| version_ops::trashed(conn, kind))
    }
}
