//! IVersionStore: the persistence collaborator consumed by the engine.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::StrataResult;
use crate::models::{EntityId, EntityRecord, VersionId, VersionRecord};

/// Live rows and covering versions read together for one instant.
#[derive(Debug, Clone, Default)]
pub struct PointInTime {
    pub live: Vec<EntityRecord>,
    /// Versions whose validity contains the instant.
    pub covering: Vec<VersionRecord>,
}

/// Durable, transactional storage for live rows and version records.
///
/// ## Transaction semantics
///
/// Mutating methods take `&mut Self::Tx`, an in-progress transaction:
///
/// 1. `begin()` starts a transaction and serializes writers, so two
///    transactions can never extend the same version chain concurrently.
/// 2. Call mutating methods with `&mut tx`.
/// 3. `commit(tx)` makes everything durable, `rollback(tx)` discards it.
///
/// Dropping a `Tx` without committing MUST roll it back.
///
/// Read methods outside a transaction use their own connection and must
/// see only committed data. They must not be called from a thread that
/// holds an open `Tx` on a single-connection backend.
pub trait IVersionStore: Send + Sync {
    type Tx<'a>
    where
        Self: 'a;

    // ── Transaction lifecycle ───────────────────────────────────────────────

    fn begin(&self) -> StrataResult<Self::Tx<'_>>;
    fn commit(&self, tx: Self::Tx<'_>) -> StrataResult<()>;
    fn rollback(&self, tx: Self::Tx<'_>) -> StrataResult<()>;

    // ── Live set (within transaction) ──────────────────────────────────────

    /// The entity's attributes as durably stored, ignoring in-memory edits.
    fn current_persisted(
        &self,
        tx: &mut Self::Tx<'_>,
        kind: &str,
        id: &EntityId,
    ) -> StrataResult<Option<EntityRecord>>;

    fn insert_live(&self, tx: &mut Self::Tx<'_>, record: &EntityRecord) -> StrataResult<()>;

    fn update_live(&self, tx: &mut Self::Tx<'_>, record: &EntityRecord) -> StrataResult<()>;

    /// Returns false when no live row existed.
    fn remove_from_live_set(
        &self,
        tx: &mut Self::Tx<'_>,
        kind: &str,
        id: &EntityId,
    ) -> StrataResult<bool>;

    /// Put a trashed entity back with its original identifier.
    fn reinsert_into_live_set(
        &self,
        tx: &mut Self::Tx<'_>,
        record: &EntityRecord,
    ) -> StrataResult<()>;

    /// Live rows of `kind` whose `foreign_key` attribute equals `parent`.
    fn find_live_children(
        &self,
        tx: &mut Self::Tx<'_>,
        kind: &str,
        foreign_key: &str,
        parent: &EntityId,
    ) -> StrataResult<Vec<EntityRecord>>;

    // ── Versions (within transaction) ──────────────────────────────────────

    fn load_most_recent_version(
        &self,
        tx: &mut Self::Tx<'_>,
        kind: &str,
        id: &EntityId,
    ) -> StrataResult<Option<VersionRecord>>;

    fn version_at(
        &self,
        tx: &mut Self::Tx<'_>,
        kind: &str,
        id: &EntityId,
        at: DateTime<Utc>,
    ) -> StrataResult<Option<VersionRecord>>;

    /// Returns the record with its assigned `version_id`.
    fn persist_version(
        &self,
        tx: &mut Self::Tx<'_>,
        version: &VersionRecord,
    ) -> StrataResult<VersionRecord>;

    /// Physically remove the whole history of an entity.
    fn purge_versions(
        &self,
        tx: &mut Self::Tx<'_>,
        kind: &str,
        id: &EntityId,
    ) -> StrataResult<usize>;

    fn versions_by_correlation(
        &self,
        tx: &mut Self::Tx<'_>,
        correlation_id: Uuid,
    ) -> StrataResult<Vec<VersionRecord>>;

    // ── Reads (committed data) ─────────────────────────────────────────────

    fn find_live(&self, kind: &str, id: &EntityId) -> StrataResult<Option<EntityRecord>>;

    fn list_live(&self, kind: &str) -> StrataResult<Vec<EntityRecord>>;

    fn get_version(&self, version_id: VersionId) -> StrataResult<Option<VersionRecord>>;

    /// All versions of an entity, ordered by validity.
    fn versions_for(&self, kind: &str, id: &EntityId) -> StrataResult<Vec<VersionRecord>>;

    fn most_recent_version(&self, kind: &str, id: &EntityId)
        -> StrataResult<Option<VersionRecord>>;

    /// Live rows and covering versions of `kind` at `at`, read in a single
    /// read transaction. `id` narrows both to one entity.
    fn point_in_time(
        &self,
        kind: &str,
        at: DateTime<Utc>,
        id: Option<&EntityId>,
    ) -> StrataResult<PointInTime>;

    fn versions_with_correlation(&self, correlation_id: Uuid) -> StrataResult<Vec<VersionRecord>>;

    /// Delete versions that are the latest record of a source with no live row.
    fn trashed_versions(&self, kind: &str) -> StrataResult<Vec<VersionRecord>>;
}
