//! The `VersioningEngine` facade.
//!
//! Owns the store, the clock, versioning configuration, registered kinds and
//! hooks. Mutations run through [`VersioningEngine::transaction`]; reads go
//! straight to committed data.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use strata_core::clock::{ClockSource, SystemClock};
use strata_core::config::{StrataConfig, VersioningConfig};
use strata_core::models::{
    Attributes, EntityFilter, EntityId, EntityRecord, EntityState, Resolved, VersionId,
    VersionRecord,
};
use strata_core::traits::{IVersionStore, Tracked};
use strata_core::StrataResult;
use strata_storage::StorageEngine;

use crate::context::UnitOfWork;
use crate::hooks::{HookEvent, HookPoint, HookRegistry};
use crate::registry::{EntityKind, KindRegistry};
use crate::resolver;
use crate::transaction::Transaction;
use crate::trash::{self, Untrashed};

pub struct VersioningEngine<S: IVersionStore> {
    store: Arc<S>,
    clock: Arc<dyn ClockSource>,
    config: RwLock<VersioningConfig>,
    kinds: RwLock<KindRegistry>,
    hooks: RwLock<HookRegistry>,
}

impl VersioningEngine<StorageEngine> {
    /// Open a file-backed engine with the SQLite store.
    pub fn open(path: &Path, config: &StrataConfig) -> StrataResult<Self> {
        let store = StorageEngine::open(path, &config.storage)?;
        Ok(Self::new(Arc::new(store), config.versioning.clone()))
    }

    /// In-memory engine. Reads share the write connection, so do not call
    /// read methods from inside a transaction closure.
    pub fn open_in_memory(config: &StrataConfig) -> StrataResult<Self> {
        let store = StorageEngine::open_in_memory()?;
        Ok(Self::new(Arc::new(store), config.versioning.clone()))
    }
}

impl<S: IVersionStore> VersioningEngine<S> {
    pub fn new(store: Arc<S>, config: VersioningConfig) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            config: RwLock::new(config),
            kinds: RwLock::new(KindRegistry::default()),
            hooks: RwLock::new(HookRegistry::default()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ── Configuration ──────────────────────────────────────────────────────

    pub fn config(&self) -> VersioningConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Adjust configuration. Transactions already running keep the values
    /// they started with.
    pub fn configure(&self, f: impl FnOnce(&mut VersioningConfig)) {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut config);
    }

    pub fn register_kind(&self, kind: EntityKind) {
        self.kinds
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(kind);
    }

    pub fn kind(&self, name: &str) -> Option<EntityKind> {
        self.kinds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Register a hook for every kind.
    pub fn on<F>(&self, point: HookPoint, callback: F)
    where
        F: Fn(&HookEvent<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(point, None, callback);
    }

    /// Register a hook for one kind.
    pub fn on_kind<F>(&self, point: HookPoint, kind: impl Into<String>, callback: F)
    where
        F: Fn(&HookEvent<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(point, Some(kind.into()), callback);
    }

    // ── Transactions ───────────────────────────────────────────────────────

    /// Run `f` inside one storage transaction: committed when it returns
    /// `Ok`, rolled back otherwise. The unit of work's generated correlation
    /// id is cleared when the transaction ends either way.
    pub fn transaction<'e, 'u, T, F>(&'e self, uow: &'u mut UnitOfWork, f: F) -> StrataResult<T>
    where
        F: FnOnce(&mut Transaction<'e, 'u, S>) -> StrataResult<T>,
    {
        let tx = self.store.begin()?;
        let config = self.config();
        let kinds = self
            .kinds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let hooks = self
            .hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut txn = Transaction::new(
            self.store.as_ref(),
            self.clock.as_ref(),
            uow,
            tx,
            config,
            kinds,
            hooks,
        );
        let result = f(&mut txn);
        txn.finish(result)
    }

    // ── One-shot mutations ─────────────────────────────────────────────────

    pub fn create(&self, uow: &mut UnitOfWork, record: EntityRecord) -> StrataResult<EntityRecord> {
        self.transaction(uow, |txn| txn.create(record))
    }

    pub fn update(
        &self,
        uow: &mut UnitOfWork,
        kind: &str,
        id: &EntityId,
        changes: Attributes,
    ) -> StrataResult<EntityRecord> {
        self.transaction(uow, |txn| txn.update(kind, id, changes))
    }

    pub fn trash(
        &self,
        uow: &mut UnitOfWork,
        kind: &str,
        id: &EntityId,
    ) -> StrataResult<Option<VersionRecord>> {
        self.transaction(uow, |txn| txn.trash(kind, id))
    }

    pub fn untrash(&self, uow: &mut UnitOfWork, version: &VersionRecord) -> StrataResult<Untrashed> {
        self.transaction(uow, |txn| txn.untrash(version))
    }

    pub fn untrash_correlated(
        &self,
        uow: &mut UnitOfWork,
        version: &VersionRecord,
    ) -> StrataResult<Vec<Untrashed>> {
        self.transaction(uow, |txn| txn.untrash_correlated(version))
    }

    pub fn revert(&self, uow: &mut UnitOfWork, version: &VersionRecord) -> StrataResult<EntityRecord> {
        self.transaction(uow, |txn| txn.revert(version))
    }

    pub fn revert_to(
        &self,
        uow: &mut UnitOfWork,
        kind: &str,
        id: &EntityId,
        at: DateTime<Utc>,
    ) -> StrataResult<Option<EntityRecord>> {
        self.transaction(uow, |txn| txn.revert_to(kind, id, at))
    }

    pub fn purge_history(&self, uow: &mut UnitOfWork, kind: &str, id: &EntityId) -> StrataResult<usize> {
        self.transaction(uow, |txn| txn.purge_history(kind, id))
    }

    // ── Reads ──────────────────────────────────────────────────────────────

    pub fn resolve(
        &self,
        kind: &str,
        id: &EntityId,
        at: DateTime<Utc>,
    ) -> StrataResult<Option<EntityState>> {
        resolver::resolve(self.store.as_ref(), self.clock.as_ref(), kind, id, at)
    }

    pub fn resolve_many(
        &self,
        kind: &str,
        at: DateTime<Utc>,
        filter: &EntityFilter,
    ) -> StrataResult<Vec<EntityState>> {
        resolver::resolve_many(self.store.as_ref(), self.clock.as_ref(), kind, at, filter)
    }

    pub fn is_trashed(&self, kind: &str, id: &EntityId) -> StrataResult<bool> {
        trash::is_trashed(self.store.as_ref(), kind, id)
    }

    pub fn find_live(&self, kind: &str, id: &EntityId) -> StrataResult<Option<EntityRecord>> {
        self.store.find_live(kind, id)
    }

    pub fn list_live(&self, kind: &str) -> StrataResult<Vec<EntityRecord>> {
        self.store.list_live(kind)
    }

    /// Every version of an entity, ordered by validity.
    pub fn versions(&self, kind: &str, id: &EntityId) -> StrataResult<Vec<VersionRecord>> {
        self.store.versions_for(kind, id)
    }

    pub fn version(&self, version_id: VersionId) -> StrataResult<Option<VersionRecord>> {
        self.store.get_version(version_id)
    }

    pub fn most_recent_version(
        &self,
        kind: &str,
        id: &EntityId,
    ) -> StrataResult<Option<VersionRecord>> {
        self.store.most_recent_version(kind, id)
    }

    pub fn versions_with_correlation(&self, correlation_id: Uuid) -> StrataResult<Vec<VersionRecord>> {
        self.store.versions_with_correlation(correlation_id)
    }

    /// Delete versions of entities of `kind` that are currently trashed.
    pub fn trashed(&self, kind: &str) -> StrataResult<Vec<VersionRecord>> {
        self.store.trashed_versions(kind)
    }

    // ── Typed convenience ──────────────────────────────────────────────────

    pub fn create_entity<T: Tracked>(&self, uow: &mut UnitOfWork, entity: &T) -> StrataResult<T> {
        let created = self.create(uow, entity.to_record()?)?;
        T::from_record(&created)
    }

    pub fn find_as<T: Tracked>(&self, id: &EntityId) -> StrataResult<Option<T>> {
        self.find_live(T::KIND, id)?
            .map(|record| T::from_record(&record))
            .transpose()
    }

    pub fn resolve_as<T: Tracked>(
        &self,
        id: &EntityId,
        at: DateTime<Utc>,
    ) -> StrataResult<Option<Resolved<T>>> {
        self.resolve(T::KIND, id, at)?
            .map(|state| state.cast::<T>())
            .transpose()
    }

    pub fn resolve_many_as<T: Tracked>(
        &self,
        at: DateTime<Utc>,
        filter: &EntityFilter,
    ) -> StrataResult<Vec<Resolved<T>>> {
        self.resolve_many(T::KIND, at, filter)?
            .iter()
            .map(|state| state.cast::<T>())
            .collect()
    }
}
