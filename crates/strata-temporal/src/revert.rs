//! RevertEngine: put a live entity back into the state an update version holds.

use chrono::{DateTime, Utc};
use tracing::info;

use strata_core::errors::TemporalError;
use strata_core::models::{EntityId, EntityRecord, EntityState, VersionOperation, VersionRecord};
use strata_core::traits::IVersionStore;
use strata_core::StrataResult;

use crate::hooks::{HookEvent, HookPoint};
use crate::resolver;
use crate::transaction::{not_found, Transaction};
use crate::writer;

/// Replace the live attributes with the snapshot in `version`.
///
/// Generated fields keep their live values. The state being reverted from
/// is itself versioned as a new `update` record; nothing is rewritten.
pub fn revert<S: IVersionStore>(
    txn: &mut Transaction<'_, '_, S>,
    version: &VersionRecord,
) -> StrataResult<EntityRecord> {
    if version.operation != VersionOperation::Update {
        return Err(TemporalError::InvalidRevertTarget {
            operation: version.operation.to_string(),
            reason: "only update versions can be reverted to".to_string(),
        }
        .into());
    }

    let kind = version.kind.as_str();
    let id = &version.source_id;
    let current = txn.find(kind, id)?.ok_or_else(|| not_found(kind, id))?;

    let mut attributes = version.snapshot.clone();
    for (field, value) in &current.attributes {
        if txn.kinds().is_generated(kind, field) {
            attributes.insert(field.clone(), value.clone());
        }
    }

    let reverted = writer::apply_update(txn, current, attributes)?;

    txn.hooks().fire(&HookEvent {
        point: HookPoint::AfterReverted,
        kind,
        source_id: id,
        version,
        entity: Some(&reverted),
    })?;

    info!(kind, %id, target = ?version.version_id, "entity reverted");
    Ok(reverted)
}

/// Revert an entity to whatever was true at `at`.
///
/// A live state at `at` leaves the entity unchanged. `None` when the entity
/// did not exist, or sat in the trash, at `at`.
pub fn revert_to<S: IVersionStore>(
    txn: &mut Transaction<'_, '_, S>,
    kind: &str,
    id: &EntityId,
    at: DateTime<Utc>,
) -> StrataResult<Option<EntityRecord>> {
    let now = txn.clock_now();
    let at = resolver::checked_instant(at, now)?;

    let (store, tx) = txn.parts()?;
    let covering = if at < now {
        store.version_at(tx, kind, id, at)?
    } else {
        None
    };
    let live = store.current_persisted(tx, kind, id)?;

    match resolver::resolve_state(kind, id, at, live, covering)? {
        None => Ok(None),
        Some(EntityState::Live(record)) => Ok(Some(record)),
        Some(EntityState::Historical(version)) => revert(txn, &version).map(Some),
    }
}
