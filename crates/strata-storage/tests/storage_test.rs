//! `IVersionStore` contract against the SQLite engine.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;

use strata_core::config::StorageConfig;
use strata_core::models::{
    Attributes, ContextSnapshot, EntityId, EntityRecord, Validity, VersionOperation,
    VersionRecord,
};
use strata_core::traits::IVersionStore;
use strata_storage::StorageEngine;

fn t(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
}

fn attrs(value: serde_json::Value) -> Attributes {
    value.as_object().cloned().unwrap()
}

fn post(id: i64, title: &str, created: i64) -> EntityRecord {
    EntityRecord::new("post", id, attrs(json!({ "title": title })))
        .with_created_at(t(created))
}

fn version(
    id: i64,
    operation: VersionOperation,
    start: i64,
    end: i64,
    correlation_id: Uuid,
) -> VersionRecord {
    VersionRecord {
        version_id: None,
        kind: "post".into(),
        source_id: EntityId::Integer(id),
        operation,
        validity: Validity::new(t(start), t(end)),
        correlation_id,
        context: ContextSnapshot {
            actor: Some(json!("alice")),
            note: Some("edit".into()),
            metadata: None,
        },
        changed_fields: attrs(json!({ "title": format!("title@{start}") })),
        snapshot: attrs(json!({ "title": format!("title@{start}") })),
        source_created_at: Some(t(0)),
        source_updated_at: Some(t(start)),
        recorded_at: t(end),
    }
}

#[test]
fn live_rows_round_trip_with_id_type() {
    let store = StorageEngine::open_in_memory().unwrap();
    let uuid = Uuid::new_v4();

    let mut tx = store.begin().unwrap();
    store.insert_live(&mut tx, &post(7, "seven", 0)).unwrap();
    store
        .insert_live(&mut tx, &EntityRecord::new("user", uuid, attrs(json!({ "name": "bo" }))))
        .unwrap();
    store.commit(tx).unwrap();

    let found = store.find_live("post", &EntityId::Integer(7)).unwrap().unwrap();
    assert_eq!(found.id, EntityId::Integer(7));
    assert_eq!(found.get("title"), Some(&json!("seven")));
    assert_eq!(found.created_at, Some(t(0)));
    assert_eq!(found.updated_at, None);

    let user = store.find_live("user", &EntityId::Uuid(uuid)).unwrap().unwrap();
    assert_eq!(user.id, EntityId::Uuid(uuid));
    assert!(store.find_live("post", &EntityId::Integer(8)).unwrap().is_none());
}

#[test]
fn dropped_transaction_rolls_back() {
    let store = StorageEngine::open_in_memory().unwrap();
    {
        let mut tx = store.begin().unwrap();
        store.insert_live(&mut tx, &post(1, "gone", 0)).unwrap();
    }
    assert!(store.find_live("post", &EntityId::Integer(1)).unwrap().is_none());

    let mut tx = store.begin().unwrap();
    store.insert_live(&mut tx, &post(1, "also gone", 0)).unwrap();
    store.rollback(tx).unwrap();
    assert!(store.list_live("post").unwrap().is_empty());
}

#[test]
fn update_of_missing_row_is_not_found() {
    let store = StorageEngine::open_in_memory().unwrap();
    let mut tx = store.begin().unwrap();
    let err = store.update_live(&mut tx, &post(3, "nope", 0)).unwrap_err();
    assert!(matches!(err, strata_core::StrataError::EntityNotFound { .. }));
}

#[test]
fn version_chain_queries() {
    let store = StorageEngine::open_in_memory().unwrap();
    let corr = Uuid::new_v4();

    let mut tx = store.begin().unwrap();
    store.insert_live(&mut tx, &post(1, "v3", 0)).unwrap();
    let first = store
        .persist_version(&mut tx, &version(1, VersionOperation::Update, 0, 10, corr))
        .unwrap();
    let second = store
        .persist_version(&mut tx, &version(1, VersionOperation::Update, 10, 20, Uuid::new_v4()))
        .unwrap();
    assert!(first.version_id.unwrap() < second.version_id.unwrap());

    let latest = store
        .load_most_recent_version(&mut tx, "post", &EntityId::Integer(1))
        .unwrap()
        .unwrap();
    assert_eq!(latest.version_id, second.version_id);

    let at = store
        .version_at(&mut tx, "post", &EntityId::Integer(1), t(10))
        .unwrap()
        .unwrap();
    assert_eq!(at.version_id, second.version_id);
    assert!(store
        .version_at(&mut tx, "post", &EntityId::Integer(1), t(20))
        .unwrap()
        .is_none());
    store.commit(tx).unwrap();

    let history = store.versions_for("post", &EntityId::Integer(1)).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].validity, Validity::new(t(0), t(10)));
    assert_eq!(history[0].context.actor, Some(json!("alice")));
    assert_eq!(history[0].source_created_at, Some(t(0)));

    let fetched = store.get_version(first.version_id.unwrap()).unwrap().unwrap();
    assert_eq!(fetched, first);

    let correlated = store.versions_with_correlation(corr).unwrap();
    assert_eq!(correlated.len(), 1);
    assert_eq!(correlated[0].version_id, first.version_id);
}

#[test]
fn point_in_time_reads_live_and_covering_together() {
    let store = StorageEngine::open_in_memory().unwrap();
    let mut tx = store.begin().unwrap();
    store.insert_live(&mut tx, &post(1, "live", 0)).unwrap();
    store.insert_live(&mut tx, &post(2, "other", 0)).unwrap();
    store
        .persist_version(&mut tx, &version(1, VersionOperation::Update, 0, 10, Uuid::new_v4()))
        .unwrap();
    store.commit(tx).unwrap();

    let all = store.point_in_time("post", t(5), None).unwrap();
    assert_eq!(all.live.len(), 2);
    assert_eq!(all.covering.len(), 1);

    let one = store
        .point_in_time("post", t(5), Some(&EntityId::Integer(2)))
        .unwrap();
    assert_eq!(one.live.len(), 1);
    assert!(one.covering.is_empty());

    let later = store.point_in_time("post", t(10), None).unwrap();
    assert!(later.covering.is_empty());
}

#[test]
fn children_match_on_foreign_key_value() {
    let store = StorageEngine::open_in_memory().unwrap();
    let mut tx = store.begin().unwrap();
    store.insert_live(&mut tx, &post(1, "parent", 0)).unwrap();
    for (id, post_id) in [(10, 1), (11, 1), (12, 2)] {
        let comment = EntityRecord::new("comment", id, attrs(json!({ "post_id": post_id })));
        store.insert_live(&mut tx, &comment).unwrap();
    }
    let children = store
        .find_live_children(&mut tx, "comment", "post_id", &EntityId::Integer(1))
        .unwrap();
    let ids: Vec<_> = children.iter().map(|c| c.id.clone()).collect();
    assert_eq!(ids, vec![EntityId::Integer(10), EntityId::Integer(11)]);
}

#[test]
fn trashed_lists_only_sources_closed_by_delete() {
    let store = StorageEngine::open_in_memory().unwrap();
    let mut tx = store.begin().unwrap();
    // 1: trashed. 2: trashed then restored. 3: live with update history.
    store
        .persist_version(&mut tx, &version(1, VersionOperation::Delete, 0, 10, Uuid::new_v4()))
        .unwrap();
    store
        .persist_version(&mut tx, &version(2, VersionOperation::Delete, 0, 10, Uuid::new_v4()))
        .unwrap();
    store
        .persist_version(&mut tx, &version(2, VersionOperation::Insert, 10, 20, Uuid::new_v4()))
        .unwrap();
    store.insert_live(&mut tx, &post(2, "back", 0)).unwrap();
    store.insert_live(&mut tx, &post(3, "live", 0)).unwrap();
    store
        .persist_version(&mut tx, &version(3, VersionOperation::Update, 0, 10, Uuid::new_v4()))
        .unwrap();
    store.commit(tx).unwrap();

    let trashed = store.trashed_versions("post").unwrap();
    assert_eq!(trashed.len(), 1);
    assert_eq!(trashed[0].source_id, EntityId::Integer(1));
}

#[test]
fn purge_removes_whole_history() {
    let store = StorageEngine::open_in_memory().unwrap();
    let mut tx = store.begin().unwrap();
    for (start, end) in [(0, 10), (10, 20)] {
        store
            .persist_version(&mut tx, &version(1, VersionOperation::Update, start, end, Uuid::new_v4()))
            .unwrap();
    }
    assert_eq!(store.purge_versions(&mut tx, "post", &EntityId::Integer(1)).unwrap(), 2);
    store.commit(tx).unwrap();
    assert!(store.versions_for("post", &EntityId::Integer(1)).unwrap().is_empty());
}

#[test]
fn file_engine_reads_committed_data_through_pool() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strata.db");
    let config = StorageConfig {
        read_pool_size: 2,
        ..StorageConfig::default()
    };
    let store = StorageEngine::open(&path, &config).unwrap();
    assert_eq!(store.path(), Some(path.as_path()));

    let mut tx = store.begin().unwrap();
    store.insert_live(&mut tx, &post(1, "pending", 0)).unwrap();
    // Uncommitted writes are invisible to readers.
    assert!(store.find_live("post", &EntityId::Integer(1)).unwrap().is_none());
    store.commit(tx).unwrap();

    for _ in 0..4 {
        assert!(store.find_live("post", &EntityId::Integer(1)).unwrap().is_some());
    }
    store.checkpoint().unwrap();
}
