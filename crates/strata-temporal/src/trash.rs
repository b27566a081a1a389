//! TrashCoordinator: soft deletion with full restoration.

use std::collections::BTreeSet;

use tracing::{debug, info};

use strata_core::errors::TemporalError;
use strata_core::models::{Attributes, EntityId, EntityRecord, Validity, VersionOperation, VersionRecord};
use strata_core::traits::IVersionStore;
use strata_core::StrataResult;

use crate::hooks::{HookEvent, HookPoint};
use crate::transaction::{not_found, Transaction};
use crate::writer;

/// A restored entity and the `insert` version documenting its time in the trash.
#[derive(Debug, Clone, PartialEq)]
pub struct Untrashed {
    pub entity: EntityRecord,
    pub restoration: VersionRecord,
}

/// Trash an entity and, first, every registered dependent of it.
///
/// Returns the terminal `delete` version, or `None` when history is not
/// preserved for the kind (the history is purged) or versioning is disabled.
pub fn trash<S: IVersionStore>(
    txn: &mut Transaction<'_, '_, S>,
    kind: &str,
    id: &EntityId,
) -> StrataResult<Option<VersionRecord>> {
    let mut visited = BTreeSet::new();
    trash_cascading(txn, kind, id, &mut visited)
}

/// `visited` holds every entity already claimed by this trash call, so
/// cyclic references between rows terminate.
fn trash_cascading<S: IVersionStore>(
    txn: &mut Transaction<'_, '_, S>,
    kind: &str,
    id: &EntityId,
    visited: &mut BTreeSet<(String, EntityId)>,
) -> StrataResult<Option<VersionRecord>> {
    let current = txn.find(kind, id)?.ok_or_else(|| not_found(kind, id))?;
    visited.insert((kind.to_string(), id.clone()));

    let rules = txn.kinds().cascades(kind).to_vec();
    for rule in rules {
        let (store, tx) = txn.parts()?;
        let children = store.find_live_children(tx, &rule.child_kind, &rule.foreign_key, id)?;
        for child in children {
            if visited.contains(&(child.kind.clone(), child.id.clone())) {
                continue;
            }
            debug!(parent_kind = kind, parent_id = %id, child_kind = %child.kind, child_id = %child.id, "cascading trash");
            trash_cascading(txn, &child.kind, &child.id, visited)?;
        }
    }

    let settings = txn.settings(kind);
    let version = if !settings.enabled {
        None
    } else if settings.preserve_on_delete {
        writer::record_mutation(txn, &current, VersionOperation::Delete, Attributes::new())?
    } else {
        let (store, tx) = txn.parts()?;
        let purged = store.purge_versions(tx, kind, id)?;
        txn.mark_written();
        info!(kind, %id, purged, "history purged on delete");
        None
    };

    let (store, tx) = txn.parts()?;
    store.remove_from_live_set(tx, kind, id)?;
    txn.mark_written();

    info!(
        kind,
        %id,
        version_id = ?version.as_ref().and_then(|v| v.version_id),
        "entity trashed"
    );
    Ok(version)
}

/// Restore a trashed entity from its terminal `delete` version.
pub fn untrash<S: IVersionStore>(
    txn: &mut Transaction<'_, '_, S>,
    version: &VersionRecord,
) -> StrataResult<Untrashed> {
    if version.operation != VersionOperation::Delete {
        return Err(TemporalError::InvalidUntrashTarget {
            operation: version.operation.to_string(),
            reason: "only delete versions can be untrashed".to_string(),
        }
        .into());
    }

    let kind = version.kind.as_str();
    let id = &version.source_id;
    let (store, tx) = txn.parts()?;
    let latest = store.load_most_recent_version(tx, kind, id)?;
    if latest.as_ref().and_then(|v| v.version_id) != version.version_id || version.version_id.is_none() {
        return Err(TemporalError::InvalidUntrashTarget {
            operation: version.operation.to_string(),
            reason: format!("not the most recent version of {kind}/{id}"),
        }
        .into());
    }
    if store.current_persisted(tx, kind, id)?.is_some() {
        return Err(TemporalError::ConsistencyViolation(format!(
            "{kind}/{id} is live, it cannot be untrashed"
        ))
        .into());
    }

    let entity = version.to_entity();
    store.reinsert_into_live_set(tx, &entity)?;
    txn.mark_written();

    let start = version.validity.end;
    let end = writer::interval_end(txn, start)?;
    let draft = VersionRecord {
        version_id: None,
        kind: kind.to_string(),
        source_id: id.clone(),
        operation: VersionOperation::Insert,
        validity: Validity::new(start, end),
        correlation_id: txn.correlation_id(),
        context: txn.context_snapshot(),
        changed_fields: Attributes::new(),
        snapshot: version.snapshot.clone(),
        source_created_at: version.source_created_at,
        source_updated_at: version.source_updated_at,
        recorded_at: txn.clock_now(),
    };
    let restoration = writer::write_version(txn, draft, Some(&entity))?;

    txn.hooks().fire(&HookEvent {
        point: HookPoint::AfterUntrashed,
        kind,
        source_id: id,
        version,
        entity: Some(&entity),
    })?;

    info!(kind, %id, restored_from = ?version.version_id, "entity untrashed");
    Ok(Untrashed {
        entity,
        restoration,
    })
}

/// Untrash `version`, then every other still-trashed entity whose delete
/// version shares its correlation id.
pub fn untrash_correlated<S: IVersionStore>(
    txn: &mut Transaction<'_, '_, S>,
    version: &VersionRecord,
) -> StrataResult<Vec<Untrashed>> {
    let mut restored = vec![untrash(txn, version)?];

    let (store, tx) = txn.parts()?;
    let siblings = store.versions_by_correlation(tx, version.correlation_id)?;
    for sibling in siblings {
        if sibling.operation != VersionOperation::Delete || sibling.version_id == version.version_id {
            continue;
        }
        if !is_trashed_in(txn, &sibling)? {
            debug!(kind = %sibling.kind, id = %sibling.source_id, "correlated entity is not trashed, skipping");
            continue;
        }
        restored.push(untrash(txn, &sibling)?);
    }
    Ok(restored)
}

/// Whether `version` is still the terminal record of a trashed entity.
fn is_trashed_in<S: IVersionStore>(
    txn: &mut Transaction<'_, '_, S>,
    version: &VersionRecord,
) -> StrataResult<bool> {
    let (store, tx) = txn.parts()?;
    if store
        .current_persisted(tx, &version.kind, &version.source_id)?
        .is_some()
    {
        return Ok(false);
    }
    let latest = store.load_most_recent_version(tx, &version.kind, &version.source_id)?;
    Ok(latest.and_then(|v| v.version_id) == version.version_id)
}

/// Not live, and the most recent version is a `delete`.
pub fn is_trashed<S: IVersionStore>(store: &S, kind: &str, id: &EntityId) -> StrataResult<bool> {
    if store.find_live(kind, id)?.is_some() {
        return Ok(false);
    }
    Ok(store
        .most_recent_version(kind, id)?
        .is_some_and(|v| v.operation == VersionOperation::Delete))
}
