//! Concurrent units of work against one file-backed engine.

use std::collections::HashMap;
use std::thread;

use serde_json::json;

use strata_core::models::{ContextOverrides, EntityId};
use strata_core::traits::Tracked;
use strata_temporal::UnitOfWork;
use test_fixtures::{attrs, Harness, Post};

const THREADS: usize = 4;
const UPDATES: usize = 25;

#[test]
fn concurrent_updates_never_overlap() {
    let mut h = Harness::on_disk();
    h.engine.create_entity(&mut h.uow, &Post::new(1, "start")).unwrap();
    let engine = &h.engine;
    let clock = &h.clock;

    thread::scope(|scope| {
        for n in 0..THREADS {
            scope.spawn(move || {
                let mut uow = UnitOfWork::with_base(
                    ContextOverrides::new().actor(format!("worker-{n}")),
                );
                for i in 0..UPDATES {
                    if i % 5 == 0 {
                        clock.advance(chrono::Duration::milliseconds(1));
                    }
                    engine
                        .update(
                            &mut uow,
                            Post::KIND,
                            &EntityId::Integer(1),
                            attrs(json!({ "title": format!("worker-{n} #{i}") })),
                        )
                        .unwrap();
                }
            });
        }
    });

    let versions = h.engine.versions(Post::KIND, &EntityId::Integer(1)).unwrap();
    assert_eq!(versions.len(), THREADS * UPDATES);
    for v in &versions {
        assert!(v.validity.start < v.validity.end);
    }
    for pair in versions.windows(2) {
        assert_eq!(pair[0].validity.end, pair[1].validity.start);
        assert!(!pair[0].validity.overlaps(&pair[1].validity));
    }

    let mut per_actor: HashMap<String, usize> = HashMap::new();
    for v in &versions {
        let actor = v.context.actor.as_ref().and_then(|a| a.as_str()).unwrap_or_default();
        *per_actor.entry(actor.to_string()).or_default() += 1;
    }
    assert_eq!(per_actor.len(), THREADS);
    assert!(per_actor.values().all(|&count| count == UPDATES));
}

#[test]
fn context_overrides_stay_with_their_unit_of_work() {
    let mut h = Harness::on_disk();
    for n in 0..THREADS as i64 {
        h.engine.create_entity(&mut h.uow, &Post::new(n, "start")).unwrap();
    }
    h.tick(1);
    let engine = &h.engine;

    thread::scope(|scope| {
        for n in 0..THREADS as i64 {
            scope.spawn(move || {
                let mut uow = UnitOfWork::new();
                let overrides = ContextOverrides::new()
                    .note(format!("note-{n}"))
                    .version_on_update(n % 2 == 0);
                uow.with_context(overrides, |uow| {
                    engine.update(
                        uow,
                        Post::KIND,
                        &EntityId::Integer(n),
                        attrs(json!({ "title": "changed" })),
                    )
                })
                .unwrap();
            });
        }
    });

    for n in 0..THREADS as i64 {
        let versions = h.engine.versions(Post::KIND, &EntityId::Integer(n)).unwrap();
        if n % 2 == 0 {
            assert_eq!(versions.len(), 1);
            assert_eq!(versions[0].context.note, Some(format!("note-{n}")));
        } else {
            assert!(versions.is_empty());
        }
    }
}
