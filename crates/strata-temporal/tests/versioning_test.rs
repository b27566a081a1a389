//! Version writing: intervals, snapshots, context and switches.

use chrono::Duration;
use serde_json::json;

use strata_core::errors::TemporalError;
use strata_core::models::{ContextOverrides, EntityId, EntityRecord, VersionOperation};
use strata_core::traits::{IVersionStore, Tracked};
use strata_core::errors::FailureOutcome;
use strata_core::StrataError;
use strata_temporal::{EntityKind, HookPoint};
use test_fixtures::{attrs, epoch, Harness, Post};

fn post(n: i64) -> EntityId {
    EntityId::Integer(n)
}

#[test]
fn update_versions_the_prior_state() {
    let mut h = Harness::in_memory();
    let created = h.engine.create_entity(&mut h.uow, &Post::new(1, "first")).unwrap();
    assert_eq!(created.created_at, Some(epoch()));

    let t1 = h.tick(10);
    let live = h
        .engine
        .update(&mut h.uow, Post::KIND, &post(1), attrs(json!({ "title": "second" })))
        .unwrap();
    assert_eq!(live.get("title"), Some(&json!("second")));
    assert_eq!(live.updated_at, Some(t1));

    let versions = h.engine.versions(Post::KIND, &post(1)).unwrap();
    assert_eq!(versions.len(), 1);
    let v = &versions[0];
    assert_eq!(v.operation, VersionOperation::Update);
    assert_eq!(v.validity.start, epoch());
    assert_eq!(v.validity.end, t1);
    assert_eq!(v.snapshot.get("title"), Some(&json!("first")));
    assert_eq!(v.snapshot.get("status"), Some(&json!("draft")));
    assert!(!v.snapshot.contains_key("id"));
    assert_eq!(v.changed_fields, attrs(json!({ "title": "first" })));
    assert_eq!(v.source_created_at, Some(epoch()));
}

#[test]
fn successive_updates_chain_end_to_start() {
    let mut h = Harness::in_memory();
    h.engine.create_entity(&mut h.uow, &Post::new(1, "v0")).unwrap();
    for i in 1..=5 {
        h.tick(i * 3);
        h.engine
            .update(&mut h.uow, Post::KIND, &post(1), attrs(json!({ "title": format!("v{i}") })))
            .unwrap();
    }
    let versions = h.engine.versions(Post::KIND, &post(1)).unwrap();
    assert_eq!(versions.len(), 5);
    assert_eq!(versions[0].validity.start, epoch());
    for pair in versions.windows(2) {
        assert_eq!(pair[0].validity.end, pair[1].validity.start);
    }
    assert_eq!(versions[4].validity.end, h.now());
}

#[test]
fn update_with_no_changes_writes_nothing() {
    let mut h = Harness::in_memory();
    h.engine.create_entity(&mut h.uow, &Post::new(1, "same")).unwrap();
    h.tick(5);
    let live = h
        .engine
        .update(&mut h.uow, Post::KIND, &post(1), attrs(json!({ "title": "same" })))
        .unwrap();
    assert_eq!(live.updated_at, Some(epoch()));
    assert!(h.engine.versions(Post::KIND, &post(1)).unwrap().is_empty());
}

#[test]
fn stalled_clock_still_yields_positive_intervals() {
    let mut h = Harness::in_memory();
    h.engine.create_entity(&mut h.uow, &Post::new(1, "a")).unwrap();
    for title in ["b", "c"] {
        h.engine
            .update(&mut h.uow, Post::KIND, &post(1), attrs(json!({ "title": title })))
            .unwrap();
    }
    let versions = h.engine.versions(Post::KIND, &post(1)).unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].validity.end, epoch() + Duration::microseconds(1));
    assert_eq!(versions[1].validity.start, versions[0].validity.end);
    assert!(versions.iter().all(|v| !v.validity.is_empty()));
}

#[test]
fn version_on_update_switch_is_layered() {
    let mut h = Harness::in_memory();
    h.engine.create_entity(&mut h.uow, &Post::new(1, "a")).unwrap();

    h.engine.configure(|c| c.version_on_update = false);
    h.tick(1);
    h.engine
        .update(&mut h.uow, Post::KIND, &post(1), attrs(json!({ "title": "b" })))
        .unwrap();
    assert!(h.engine.versions(Post::KIND, &post(1)).unwrap().is_empty());

    h.engine
        .configure(|c| c.entity_mut(Post::KIND).version_on_update = Some(true));
    h.tick(1);
    h.engine
        .update(&mut h.uow, Post::KIND, &post(1), attrs(json!({ "title": "c" })))
        .unwrap();
    assert_eq!(h.engine.versions(Post::KIND, &post(1)).unwrap().len(), 1);

    h.tick(1);
    let engine = &h.engine;
    h.uow
        .with_context(ContextOverrides::new().version_on_update(false), |uow| {
            engine.update(uow, Post::KIND, &post(1), attrs(json!({ "title": "d" })))
        })
        .unwrap();
    assert_eq!(h.engine.versions(Post::KIND, &post(1)).unwrap().len(), 1);
}

#[test]
fn master_switch_disables_versioning() {
    let mut h = Harness::in_memory();
    h.engine.create_entity(&mut h.uow, &Post::new(1, "a")).unwrap();
    h.tick(1);
    let engine = &h.engine;
    h.uow
        .with_context(ContextOverrides::new().enabled(false), |uow| {
            engine.update(uow, Post::KIND, &post(1), attrs(json!({ "title": "b" })))
        })
        .unwrap();
    assert!(h.engine.versions(Post::KIND, &post(1)).unwrap().is_empty());
    assert_eq!(
        h.engine.find_live(Post::KIND, &post(1)).unwrap().unwrap().get("title"),
        Some(&json!("b"))
    );
}

#[test]
fn missing_created_at_fails_before_any_write() {
    let mut h = Harness::in_memory();
    let store = h.engine.store().clone();
    let mut tx = store.begin().unwrap();
    store
        .insert_live(&mut tx, &EntityRecord::new(Post::KIND, 1_i64, attrs(json!({ "title": "undated" }))))
        .unwrap();
    store.commit(tx).unwrap();

    let err = h
        .engine
        .update(&mut h.uow, Post::KIND, &post(1), attrs(json!({ "title": "x" })))
        .unwrap_err();
    assert!(matches!(
        err.as_temporal(),
        Some(TemporalError::MissingCreationTimestamp { .. })
    ));
    assert_eq!(err.outcome(), FailureOutcome::Unchanged);
    assert_eq!(
        h.engine.find_live(Post::KIND, &post(1)).unwrap().unwrap().get("title"),
        Some(&json!("undated"))
    );
}

#[test]
fn now_override_sets_the_upper_bound() {
    let mut h = Harness::in_memory();
    h.engine.create_entity(&mut h.uow, &Post::new(1, "a")).unwrap();
    h.tick(100);
    let backdated = epoch() + Duration::seconds(40);

    let engine = &h.engine;
    h.uow
        .with_context(ContextOverrides::new().now(backdated), |uow| {
            engine.update(uow, Post::KIND, &post(1), attrs(json!({ "title": "b" })))
        })
        .unwrap();
    let versions = h.engine.versions(Post::KIND, &post(1)).unwrap();
    assert_eq!(versions[0].validity.end, backdated);

    let err = h
        .uow
        .with_context(ContextOverrides::new().now(backdated), |uow| {
            engine.update(uow, Post::KIND, &post(1), attrs(json!({ "title": "c" })))
        })
        .unwrap_err();
    assert!(matches!(
        err.as_temporal(),
        Some(TemporalError::InvalidTemporalBound { .. })
    ));
}

#[test]
fn sub_microsecond_now_override_cannot_produce_an_empty_interval() {
    let mut h = Harness::in_memory();
    h.engine.create_entity(&mut h.uow, &Post::new(1, "a")).unwrap();
    h.tick(10);
    let engine = &h.engine;

    let err = h
        .uow
        .with_context(ContextOverrides::new().now(epoch() + Duration::nanoseconds(500)), |uow| {
            engine.update(uow, Post::KIND, &post(1), attrs(json!({ "title": "b" })))
        })
        .unwrap_err();
    assert!(matches!(
        err.as_temporal(),
        Some(TemporalError::InvalidTemporalBound { .. })
    ));
    assert!(h.engine.versions(Post::KIND, &post(1)).unwrap().is_empty());
}

#[test]
fn context_is_resolved_at_write_time() {
    let mut h = Harness::in_memory();
    h.engine.create_entity(&mut h.uow, &Post::new(1, "a")).unwrap();
    h.tick(1);

    let clock = h.clock.clone();
    let engine = &h.engine;
    let overrides = ContextOverrides::new()
        .actor("alice")
        .note("typo fix")
        .metadata_with(move || json!({ "at": clock_now_string(&clock) }));
    h.uow
        .with_context(overrides, |uow| {
            engine.update(uow, Post::KIND, &post(1), attrs(json!({ "title": "b" })))
        })
        .unwrap();

    let v = &h.engine.versions(Post::KIND, &post(1)).unwrap()[0];
    assert_eq!(v.context.actor, Some(json!("alice")));
    assert_eq!(v.context.note.as_deref(), Some("typo fix"));
    assert_eq!(
        v.context.metadata,
        Some(json!({ "at": (epoch() + Duration::seconds(1)).to_rfc3339() }))
    );
    assert_eq!(h.uow.context_snapshot().actor, None);
}

fn clock_now_string(clock: &strata_core::ManualClock) -> String {
    use strata_core::ClockSource;
    clock.now().to_rfc3339()
}

#[test]
fn snapshot_comes_from_storage_not_the_callers_copy() {
    let mut h = Harness::in_memory();
    h.engine.create_entity(&mut h.uow, &Post::new(1, "persisted")).unwrap();
    h.tick(1);

    let version = h
        .engine
        .transaction(&mut h.uow, |txn| {
            let mut edited = txn.find(Post::KIND, &post(1))?.unwrap();
            edited.attributes.insert("title".into(), json!("unsaved edit"));
            txn.record_mutation(&edited, VersionOperation::Update, attrs(json!({})))
        })
        .unwrap()
        .unwrap();
    assert_eq!(version.snapshot.get("title"), Some(&json!("persisted")));
}

#[test]
fn generated_fields_are_not_snapshotted() {
    let mut h = Harness::in_memory();
    h.engine
        .register_kind(EntityKind::new("articles").generated(["search_vector"]));
    h.engine
        .create(
            &mut h.uow,
            EntityRecord::new("articles", 1_i64, attrs(json!({ "title": "a", "search_vector": "'a'" }))),
        )
        .unwrap();
    h.tick(1);
    h.engine
        .update(&mut h.uow, "articles", &post(1), attrs(json!({ "title": "b" })))
        .unwrap();
    let v = &h.engine.versions("articles", &post(1)).unwrap()[0];
    assert_eq!(v.snapshot, attrs(json!({ "title": "a" })));
}

#[test]
fn one_transaction_shares_one_correlation_id() {
    let mut h = Harness::in_memory();
    h.engine.create_entity(&mut h.uow, &Post::new(1, "a")).unwrap();
    h.engine.create_entity(&mut h.uow, &Post::new(2, "b")).unwrap();
    h.tick(1);

    let corr = h
        .engine
        .transaction(&mut h.uow, |txn| {
            txn.update(Post::KIND, &post(1), attrs(json!({ "title": "a2" })))?;
            txn.update(Post::KIND, &post(2), attrs(json!({ "title": "b2" })))?;
            assert!(txn.current_version().is_some());
            Ok(txn.correlation_id())
        })
        .unwrap();

    let correlated = h.engine.versions_with_correlation(corr).unwrap();
    assert_eq!(correlated.len(), 2);

    h.tick(1);
    h.engine
        .update(&mut h.uow, Post::KIND, &post(1), attrs(json!({ "title": "a3" })))
        .unwrap();
    let latest = h.engine.most_recent_version(Post::KIND, &post(1)).unwrap().unwrap();
    assert_ne!(latest.correlation_id, corr);
    assert!(!h.uow.in_transaction());
}

#[test]
fn failing_before_version_hook_changes_nothing() {
    let mut h = Harness::in_memory();
    h.engine.create_entity(&mut h.uow, &Post::new(1, "a")).unwrap();
    h.engine
        .on(HookPoint::BeforeVersion, |_| Err("frozen".to_string()));
    h.tick(1);

    let err = h
        .engine
        .update(&mut h.uow, Post::KIND, &post(1), attrs(json!({ "title": "b" })))
        .unwrap_err();
    assert!(matches!(err, StrataError::HookAborted { .. }));
    assert_eq!(err.outcome(), FailureOutcome::Unchanged);
    assert!(h.engine.versions(Post::KIND, &post(1)).unwrap().is_empty());
}

#[test]
fn failing_after_version_hook_rolls_back_both_writes() {
    let mut h = Harness::in_memory();
    h.engine.create_entity(&mut h.uow, &Post::new(1, "a")).unwrap();
    h.engine.on_kind(HookPoint::AfterVersion, Post::KIND, |event| {
        assert!(event.version.is_persisted());
        Err("audit sink offline".to_string())
    });
    h.tick(1);

    let err = h
        .engine
        .update(&mut h.uow, Post::KIND, &post(1), attrs(json!({ "title": "b" })))
        .unwrap_err();
    assert_eq!(err.outcome(), FailureOutcome::RolledBack);
    assert!(matches!(err.root(), StrataError::HookAborted { .. }));
    assert!(h.engine.versions(Post::KIND, &post(1)).unwrap().is_empty());
    assert_eq!(
        h.engine.find_live(Post::KIND, &post(1)).unwrap().unwrap().get("title"),
        Some(&json!("a"))
    );
}
