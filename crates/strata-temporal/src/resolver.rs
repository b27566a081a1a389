//! TemporalResolver: which representation of an entity was true at an instant.
//!
//! A version whose interval contains the instant wins over the live row.
//! `update` and `delete` versions carry the state that was true then; an
//! `insert` version covers a period the entity spent in the trash.
//!
//! The present instant always reads the live set. Writes that land within
//! one clock tick are nudged past `now`, so their versions may still cover it.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use strata_core::clock::{to_precision, ClockSource};
use strata_core::errors::TemporalError;
use strata_core::models::{
    EntityFilter, EntityId, EntityRecord, EntityState, VersionOperation, VersionRecord,
};
use strata_core::traits::{AttributeAccess, IVersionStore, PointInTime};
use strata_core::StrataResult;

/// Truncate `at` to stored precision, rejecting it if later than `now`.
pub fn checked_instant(at: DateTime<Utc>, now: DateTime<Utc>) -> StrataResult<DateTime<Utc>> {
    let at = to_precision(at);
    if at > now {
        return Err(TemporalError::FutureQuery { requested: at, now }.into());
    }
    Ok(at)
}

/// State of one entity at `at`, given its live row and covering version.
pub fn resolve_state(
    kind: &str,
    id: &EntityId,
    at: DateTime<Utc>,
    live: Option<EntityRecord>,
    covering: Option<VersionRecord>,
) -> StrataResult<Option<EntityState>> {
    if let Some(version) = covering {
        debug!(kind, %id, %at, operation = %version.operation, "resolved from version");
        return Ok(match version.operation {
            VersionOperation::Update | VersionOperation::Delete => {
                Some(EntityState::Historical(version))
            }
            VersionOperation::Insert => None,
        });
    }

    let Some(record) = live else {
        debug!(kind, %id, %at, "no state at instant");
        return Ok(None);
    };
    match record.created_at {
        None => Err(TemporalError::MissingCreationTimestamp {
            kind: kind.to_string(),
            id: id.to_string(),
        }
        .into()),
        Some(created_at) if created_at <= at => {
            debug!(kind, %id, %at, "resolved to live row");
            Ok(Some(EntityState::Live(record)))
        }
        Some(_) => Ok(None),
    }
}

/// Every entity of `kind` as of `at`, ordered by id.
pub fn resolve_point_in_time(
    kind: &str,
    at: DateTime<Utc>,
    point: PointInTime,
    filter: &EntityFilter,
) -> StrataResult<Vec<EntityState>> {
    let mut covering: BTreeMap<EntityId, VersionRecord> = BTreeMap::new();
    for version in point.covering {
        match covering.entry(version.source_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(version);
            }
            Entry::Occupied(mut slot) => {
                if version.version_id > slot.get().version_id {
                    slot.insert(version);
                }
            }
        }
    }

    let mut live: BTreeMap<EntityId, EntityRecord> = point
        .live
        .into_iter()
        .map(|record| (record.id.clone(), record))
        .collect();

    let mut resolved: BTreeMap<EntityId, EntityState> = BTreeMap::new();
    for (id, version) in covering {
        live.remove(&id);
        if let Some(state) = resolve_state(kind, &id, at, None, Some(version))? {
            resolved.insert(id, state);
        }
    }
    for (id, record) in live {
        if let Some(state) = resolve_state(kind, &id, at, Some(record), None)? {
            resolved.insert(id, state);
        }
    }

    Ok(resolved
        .into_iter()
        .filter(|(id, state)| filter.matches(id, state.attributes()))
        .map(|(_, state)| state)
        .collect())
}

/// Resolve one entity against committed data.
pub fn resolve<S: IVersionStore>(
    store: &S,
    clock: &dyn ClockSource,
    kind: &str,
    id: &EntityId,
    at: DateTime<Utc>,
) -> StrataResult<Option<EntityState>> {
    let now = clock.now();
    let at = checked_instant(at, now)?;
    let point = store.point_in_time(kind, at, Some(id))?;
    let live = point.live.into_iter().find(|r| &r.id == id);
    let covering = point
        .covering
        .into_iter()
        .filter(|v| &v.source_id == id && at < now)
        .max_by_key(|v| v.version_id);
    resolve_state(kind, id, at, live, covering)
}

/// Resolve every entity of `kind` against committed data.
pub fn resolve_many<S: IVersionStore>(
    store: &S,
    clock: &dyn ClockSource,
    kind: &str,
    at: DateTime<Utc>,
    filter: &EntityFilter,
) -> StrataResult<Vec<EntityState>> {
    let now = clock.now();
    let at = checked_instant(at, now)?;
    let mut point = store.point_in_time(kind, at, None)?;
    if at == now {
        point.covering.clear();
    }
    resolve_point_in_time(kind, at, point, filter)
}
