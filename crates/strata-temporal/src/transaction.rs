//! `Transaction`: one storage transaction plus the unit of work it runs for.
//!
//! Every mutation of a tracked entity goes through a `Transaction` so that the
//! live change and its version record commit or roll back together.

use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use strata_core::clock::ClockSource;
use strata_core::config::{VersioningConfig, VersioningSettings};
use strata_core::errors::TemporalError;
use strata_core::models::{
    Attributes, ContextOverrides, ContextSnapshot, EntityId, EntityRecord, VersionOperation,
    VersionRecord,
};
use strata_core::traits::IVersionStore;
use strata_core::{StrataError, StrataResult};

use crate::context::UnitOfWork;
use crate::correlation;
use crate::hooks::HookRegistry;
use crate::registry::KindRegistry;
use crate::trash::Untrashed;
use crate::{revert, trash, writer};

pub struct Transaction<'e, 'u, S>
where
    S: IVersionStore + 'e,
{
    store: &'e S,
    clock: &'e dyn ClockSource,
    uow: &'u mut UnitOfWork,
    tx: Option<S::Tx<'e>>,
    config: VersioningConfig,
    kinds: KindRegistry,
    hooks: HookRegistry,
    wrote: bool,
    current_version: Option<VersionRecord>,
}

impl<'e, 'u, S> Transaction<'e, 'u, S>
where
    S: IVersionStore + 'e,
{
    pub(crate) fn new(
        store: &'e S,
        clock: &'e dyn ClockSource,
        uow: &'u mut UnitOfWork,
        tx: S::Tx<'e>,
        config: VersioningConfig,
        kinds: KindRegistry,
        hooks: HookRegistry,
    ) -> Self {
        uow.enter_transaction();
        Self {
            store,
            clock,
            uow,
            tx: Some(tx),
            config,
            kinds,
            hooks,
            wrote: false,
            current_version: None,
        }
    }

    /// Commit on `Ok`, roll back on `Err`. A failure after anything was
    /// written comes back wrapped in `StrataError::RolledBack`.
    pub(crate) fn finish<T>(mut self, result: StrataResult<T>) -> StrataResult<T> {
        let tx = self.tx.take().ok_or_else(finished_error)?;
        match result {
            Ok(value) => match self.store.commit(tx) {
                Ok(()) => Ok(value),
                Err(e) => {
                    warn!(error = %e, "commit failed, transaction rolled back");
                    Err(self.wrap(e))
                }
            },
            Err(e) => {
                warn!(error = %e, wrote = self.wrote, "rolling back transaction");
                if let Err(rollback) = self.store.rollback(tx) {
                    warn!(error = %rollback, "rollback failed");
                }
                Err(self.wrap(e))
            }
        }
    }

    fn wrap(&self, error: StrataError) -> StrataError {
        if self.wrote && !matches!(error, StrataError::RolledBack(_)) {
            StrataError::RolledBack(Box::new(error))
        } else {
            error
        }
    }

    // ── Internals shared by the writer, trash and revert modules ───────────

    pub(crate) fn parts(&mut self) -> StrataResult<(&'e S, &mut S::Tx<'e>)> {
        let store = self.store;
        let tx = self.tx.as_mut().ok_or_else(finished_error)?;
        Ok((store, tx))
    }

    pub(crate) fn mark_written(&mut self) {
        self.wrote = true;
    }

    pub(crate) fn set_current_version(&mut self, version: VersionRecord) {
        self.current_version = Some(version);
    }

    pub(crate) fn kinds(&self) -> &KindRegistry {
        &self.kinds
    }

    pub(crate) fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub(crate) fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn now_override(&self) -> Option<DateTime<Utc>> {
        self.uow.now_override()
    }

    pub(crate) fn context_snapshot(&self) -> ContextSnapshot {
        self.uow.context_snapshot()
    }

    // ── Public surface ─────────────────────────────────────────────────────

    /// Versioning switches in effect for `kind` right now.
    pub fn settings(&self, kind: &str) -> VersioningSettings {
        self.uow.effective_settings(&self.config, kind)
    }

    /// The correlation id shared by every version this transaction writes.
    pub fn correlation_id(&mut self) -> Uuid {
        correlation::ensure_correlation_id(self.uow)
    }

    /// The `now` override if one is set, else the clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.now_override().unwrap_or_else(|| self.clock_now())
    }

    /// The version most recently written by this transaction.
    pub fn current_version(&self) -> Option<&VersionRecord> {
        self.current_version.as_ref()
    }

    pub fn has_written(&self) -> bool {
        self.wrote
    }

    /// Push `overrides` for as long as the returned guard lives.
    pub fn scoped(&mut self, overrides: ContextOverrides) -> ScopedTransaction<'_, 'e, 'u, S> {
        let depth = self.uow.push_frame(&overrides);
        ScopedTransaction { txn: self, depth }
    }

    /// Run `f` with `overrides` applied on top of the current frame.
    pub fn with_context<R>(
        &mut self,
        overrides: ContextOverrides,
        f: impl FnOnce(&mut Transaction<'e, 'u, S>) -> R,
    ) -> R {
        let mut scoped = self.scoped(overrides);
        f(&mut *scoped)
    }

    /// The persisted live state, ignoring anything not yet written.
    pub fn find(&mut self, kind: &str, id: &EntityId) -> StrataResult<Option<EntityRecord>> {
        let (store, tx) = self.parts()?;
        store.current_persisted(tx, kind, id)
    }

    /// Insert a new live entity. No version is written.
    ///
    /// Missing `created_at` / `updated_at` are filled with the current time.
    pub fn create(&mut self, mut record: EntityRecord) -> StrataResult<EntityRecord> {
        let now = self.now();
        let (store, tx) = self.parts()?;
        if store.current_persisted(tx, &record.kind, &record.id)?.is_some() {
            return Err(TemporalError::ConsistencyViolation(format!(
                "{}/{} already exists",
                record.kind, record.id
            ))
            .into());
        }
        if store
            .load_most_recent_version(tx, &record.kind, &record.id)?
            .is_some()
        {
            return Err(TemporalError::ConsistencyViolation(format!(
                "{}/{} has history but no live row; untrash it instead",
                record.kind, record.id
            ))
            .into());
        }
        record.created_at.get_or_insert(now);
        record.updated_at.get_or_insert(now);
        store.insert_live(tx, &record)?;
        self.mark_written();
        Ok(record)
    }

    /// Merge `changes` into the live attributes, versioning the prior state.
    /// Returns the entity unchanged when nothing actually differs.
    pub fn update(
        &mut self,
        kind: &str,
        id: &EntityId,
        changes: Attributes,
    ) -> StrataResult<EntityRecord> {
        let current = self.find(kind, id)?.ok_or_else(|| not_found(kind, id))?;
        let mut attributes = current.attributes.clone();
        attributes.extend(changes);
        writer::apply_update(self, current, attributes)
    }

    /// Write the version for a mutation about to be applied to `current`.
    pub fn record_mutation(
        &mut self,
        current: &EntityRecord,
        operation: VersionOperation,
        changed_fields: Attributes,
    ) -> StrataResult<Option<VersionRecord>> {
        writer::record_mutation(self, current, operation, changed_fields)
    }

    pub fn trash(&mut self, kind: &str, id: &EntityId) -> StrataResult<Option<VersionRecord>> {
        trash::trash(self, kind, id)
    }

    pub fn untrash(&mut self, version: &VersionRecord) -> StrataResult<Untrashed> {
        trash::untrash(self, version)
    }

    pub fn untrash_correlated(&mut self, version: &VersionRecord) -> StrataResult<Vec<Untrashed>> {
        trash::untrash_correlated(self, version)
    }

    pub fn revert(&mut self, version: &VersionRecord) -> StrataResult<EntityRecord> {
        revert::revert(self, version)
    }

    pub fn revert_to(
        &mut self,
        kind: &str,
        id: &EntityId,
        at: DateTime<Utc>,
    ) -> StrataResult<Option<EntityRecord>> {
        revert::revert_to(self, kind, id, at)
    }

    /// Physically remove every version of an entity. Returns how many.
    pub fn purge_history(&mut self, kind: &str, id: &EntityId) -> StrataResult<usize> {
        let (store, tx) = self.parts()?;
        let purged = store.purge_versions(tx, kind, id)?;
        if purged > 0 {
            self.mark_written();
        }
        Ok(purged)
    }
}

impl<'e, 'u, S> Drop for Transaction<'e, 'u, S>
where
    S: IVersionStore + 'e,
{
    fn drop(&mut self) {
        self.uow.exit_transaction();
        correlation::clear_correlation_id(self.uow);
    }
}

/// A transaction with an extra context frame, popped on drop.
pub struct ScopedTransaction<'t, 'e, 'u, S>
where
    S: IVersionStore + 'e,
{
    txn: &'t mut Transaction<'e, 'u, S>,
    depth: usize,
}

impl<'e, 'u, S> Deref for ScopedTransaction<'_, 'e, 'u, S>
where
    S: IVersionStore + 'e,
{
    type Target = Transaction<'e, 'u, S>;

    fn deref(&self) -> &Self::Target {
        self.txn
    }
}

impl<'e, 'u, S> DerefMut for ScopedTransaction<'_, 'e, 'u, S>
where
    S: IVersionStore + 'e,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.txn
    }
}

impl<'e, 'u, S> Drop for ScopedTransaction<'_, 'e, 'u, S>
where
    S: IVersionStore + 'e,
{
    fn drop(&mut self) {
        self.txn.uow.restore_depth(self.depth);
    }
}

pub(crate) fn not_found(kind: &str, id: &EntityId) -> StrataError {
    StrataError::EntityNotFound {
        kind: kind.to_string(),
        id: id.to_string(),
    }
}

fn finished_error() -> StrataError {
    TemporalError::ConsistencyViolation("transaction already finished".to_string()).into()
}
