//! VersionWriter: snapshots the persisted state of an entity into a version
//! record, inside the transaction that mutates it.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use strata_core::errors::TemporalError;
use strata_core::models::{Attributes, EntityRecord, Validity, VersionOperation, VersionRecord};
use strata_core::traits::IVersionStore;
use strata_core::StrataResult;

use crate::hooks::{HookEvent, HookPoint};
use crate::registry::KindRegistry;
use crate::transaction::{not_found, Transaction};

/// Write the version record for a mutation about to be applied to `current`.
///
/// The snapshot is read from storage, so unsaved edits on `current` never
/// leak into history. Returns `None` when versioning is switched off for
/// this mutation.
pub fn record_mutation<S: IVersionStore>(
    txn: &mut Transaction<'_, '_, S>,
    current: &EntityRecord,
    operation: VersionOperation,
    changed_fields: Attributes,
) -> StrataResult<Option<VersionRecord>> {
    let kind = current.kind.as_str();
    let settings = txn.settings(kind);
    if !settings.enabled || (operation == VersionOperation::Update && !settings.version_on_update) {
        debug!(kind, id = %current.id, %operation, "versioning disabled, no version written");
        return Ok(None);
    }

    let (store, tx) = txn.parts()?;
    let persisted = store
        .current_persisted(tx, kind, &current.id)?
        .ok_or_else(|| not_found(kind, &current.id))?;
    let latest = store.load_most_recent_version(tx, kind, &current.id)?;

    let start = match latest {
        Some(latest) => latest.validity.end,
        None => persisted
            .created_at
            .ok_or_else(|| TemporalError::MissingCreationTimestamp {
                kind: kind.to_string(),
                id: current.id.to_string(),
            })?,
    };
    let end = interval_end(txn, start)?;

    let version = VersionRecord {
        version_id: None,
        kind: kind.to_string(),
        source_id: persisted.id.clone(),
        operation,
        validity: Validity::new(start, end),
        correlation_id: txn.correlation_id(),
        context: txn.context_snapshot(),
        changed_fields,
        snapshot: snapshot_attributes(txn.kinds(), kind, &persisted.attributes),
        source_created_at: persisted.created_at,
        source_updated_at: persisted.updated_at,
        recorded_at: txn.clock_now(),
    };

    write_version(txn, version, Some(&persisted)).map(Some)
}

/// Upper bound of a version starting at `start`.
///
/// An explicit `now` override must lie after `start`. A wall-clock reading
/// that does not is moved one microsecond past `start`.
pub(crate) fn interval_end<S: IVersionStore>(
    txn: &Transaction<'_, '_, S>,
    start: DateTime<Utc>,
) -> StrataResult<DateTime<Utc>> {
    if let Some(end) = txn.now_override() {
        if end <= start {
            return Err(TemporalError::InvalidTemporalBound { start, end }.into());
        }
        return Ok(end);
    }

    let now = txn.clock_now();
    if now > start {
        return Ok(now);
    }
    let nudged = start + Duration::microseconds(1);
    warn!(%start, %now, %nudged, "clock did not advance past previous version end");
    Ok(nudged)
}

/// Persist `version`, firing the before/after version hooks around it.
pub(crate) fn write_version<S: IVersionStore>(
    txn: &mut Transaction<'_, '_, S>,
    version: VersionRecord,
    entity: Option<&EntityRecord>,
) -> StrataResult<VersionRecord> {
    txn.hooks().fire(&HookEvent {
        point: HookPoint::BeforeVersion,
        kind: &version.kind,
        source_id: &version.source_id,
        version: &version,
        entity,
    })?;

    let (store, tx) = txn.parts()?;
    let persisted = store.persist_version(tx, &version)?;
    txn.mark_written();

    debug!(
        kind = %persisted.kind,
        id = %persisted.source_id,
        operation = %persisted.operation,
        start = %persisted.validity.start,
        end = %persisted.validity.end,
        version_id = ?persisted.version_id,
        "version written"
    );

    txn.hooks().fire(&HookEvent {
        point: HookPoint::AfterVersion,
        kind: &persisted.kind,
        source_id: &persisted.source_id,
        version: &persisted,
        entity,
    })?;

    txn.set_current_version(persisted.clone());
    Ok(persisted)
}

/// Replace the live attributes of `current` with `attributes`, versioning
/// the prior state first. Returns `current` untouched when nothing differs.
pub(crate) fn apply_update<S: IVersionStore>(
    txn: &mut Transaction<'_, '_, S>,
    current: EntityRecord,
    attributes: Attributes,
) -> StrataResult<EntityRecord> {
    let changed = changed_fields(&current.attributes, &attributes);
    if changed.is_empty() {
        debug!(kind = %current.kind, id = %current.id, "update changes nothing");
        return Ok(current);
    }

    let version = record_mutation(txn, &current, VersionOperation::Update, changed)?;
    let updated_at = match &version {
        Some(v) => v.validity.end,
        None => txn.now(),
    };

    let updated = EntityRecord {
        attributes,
        updated_at: Some(updated_at),
        ..current
    };
    let (store, tx) = txn.parts()?;
    store.update_live(tx, &updated)?;
    txn.mark_written();
    Ok(updated)
}

/// Field → previous value for every field whose value differs between
/// `before` and `after`. Removed fields are included, added ones map to null.
pub fn changed_fields(before: &Attributes, after: &Attributes) -> Attributes {
    let mut changed = Attributes::new();
    for (field, old) in before {
        if after.get(field) != Some(old) {
            changed.insert(field.clone(), old.clone());
        }
    }
    for field in after.keys() {
        if !before.contains_key(field) {
            changed.insert(field.clone(), Value::Null);
        }
    }
    changed
}

/// `attributes` without the generated fields registered for `kind`.
pub fn snapshot_attributes(kinds: &KindRegistry, kind: &str, attributes: &Attributes) -> Attributes {
    attributes
        .iter()
        .filter(|(field, _)| !kinds.is_generated(kind, field))
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect()
}
