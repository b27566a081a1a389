//! Property tests: interval tiling and resolution over random lifecycles.

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use serde_json::json;

use strata_core::models::{EntityFilter, EntityId, VersionOperation};
use strata_core::traits::{AttributeAccess, Tracked};
use test_fixtures::{attrs, epoch, Harness, Post};

#[derive(Debug, Clone, Copy)]
enum Op {
    Update,
    Trash,
    Untrash,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![3 => Just(Op::Update), 1 => Just(Op::Trash), 1 => Just(Op::Untrash)]
}

/// Apply `ops` to post 1, returning (instant, title or None if absent).
fn run(h: &mut Harness, ops: &[(Op, i64)]) -> Vec<(DateTime<Utc>, Option<String>)> {
    let id = EntityId::Integer(1);
    h.engine.create_entity(&mut h.uow, &Post::new(1, "t0")).unwrap();
    let mut timeline = vec![(epoch(), Some("t0".to_string()))];
    let mut current = Some("t0".to_string());

    for (step, &(op, secs)) in ops.iter().enumerate() {
        let now = h.tick(secs);
        match (op, current.is_some()) {
            (Op::Update, true) => {
                let title = format!("t{}", step + 1);
                h.engine
                    .update(&mut h.uow, Post::KIND, &id, attrs(json!({ "title": title })))
                    .unwrap();
                current = Some(title);
            }
            (Op::Trash, true) => {
                h.engine.trash(&mut h.uow, Post::KIND, &id).unwrap();
                current = None;
            }
            (Op::Untrash, false) => {
                let deleted = h.engine.most_recent_version(Post::KIND, &id).unwrap().unwrap();
                let restored = h.engine.untrash(&mut h.uow, &deleted).unwrap();
                current = restored.entity.get("title").and_then(|v| v.as_str()).map(String::from);
            }
            _ => continue,
        }
        timeline.push((now, current.clone()));
    }
    timeline
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn versions_tile_from_creation_to_last_change(
        ops in prop::collection::vec((op(), 1i64..120), 1..20)
    ) {
        let mut h = Harness::in_memory();
        let timeline = run(&mut h, &ops);
        let versions = h.engine.versions(Post::KIND, &EntityId::Integer(1)).unwrap();

        if let Some(first) = versions.first() {
            prop_assert_eq!(first.validity.start, epoch());
        }
        for v in &versions {
            prop_assert!(v.validity.start < v.validity.end);
        }
        for pair in versions.windows(2) {
            prop_assert_eq!(pair[0].validity.end, pair[1].validity.start);
        }
        if let Some(last) = versions.last() {
            prop_assert_eq!(last.validity.end, timeline.last().unwrap().0);
        }
        let inserts = versions.iter().filter(|v| v.operation == VersionOperation::Insert).count();
        let deletes = versions.iter().filter(|v| v.operation == VersionOperation::Delete).count();
        prop_assert!(deletes == inserts || deletes == inserts + 1);
    }

    #[test]
    fn resolution_matches_the_recorded_timeline(
        ops in prop::collection::vec((op(), 1i64..120), 1..20)
    ) {
        let mut h = Harness::in_memory();
        let timeline = run(&mut h, &ops);
        let id = EntityId::Integer(1);

        let title_at = |at: DateTime<Utc>| {
            h.engine
                .resolve(Post::KIND, &id, at)
                .unwrap()
                .and_then(|s| s.attribute("title").and_then(|v| v.as_str()).map(String::from))
        };

        for (i, (at, expected)) in timeline.iter().enumerate() {
            prop_assert_eq!(&title_at(*at), expected);
            prop_assert_eq!(title_at(*at), title_at(*at));
            if i > 0 {
                let just_before = *at - Duration::microseconds(1);
                prop_assert_eq!(&title_at(just_before), &timeline[i - 1].1);
            }

            let many = h.engine.resolve_many(Post::KIND, *at, &EntityFilter::all()).unwrap();
            prop_assert_eq!(many.len(), usize::from(expected.is_some()));
        }
    }
}
