//! Resolution benchmarks: single-entity and whole-kind point-in-time reads.

use chrono::Duration;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use strata_core::models::{EntityFilter, EntityId};
use strata_core::traits::Tracked;
use test_fixtures::{attrs, epoch, Harness, Post};

const POSTS: i64 = 200;
const UPDATES: i64 = 10;

fn setup() -> Harness {
    let mut h = Harness::on_disk();
    for id in 0..POSTS {
        h.engine
            .create_entity(&mut h.uow, &Post::new(id, "v0"))
            .unwrap();
    }
    for round in 1..=UPDATES {
        h.tick(60);
        for id in 0..POSTS {
            h.engine
                .update(
                    &mut h.uow,
                    Post::KIND,
                    &EntityId::Integer(id),
                    attrs(json!({ "title": format!("v{round}") })),
                )
                .unwrap();
        }
    }
    h
}

fn bench_resolve(c: &mut Criterion) {
    let h = setup();
    let historical = epoch() + Duration::seconds(150);
    let id = EntityId::Integer(POSTS / 2);

    c.bench_function("resolve_historical", |b| {
        b.iter(|| h.engine.resolve(Post::KIND, black_box(&id), black_box(historical)).unwrap())
    });

    let now = h.now();
    c.bench_function("resolve_live", |b| {
        b.iter(|| h.engine.resolve(Post::KIND, black_box(&id), black_box(now)).unwrap())
    });

    c.bench_function("resolve_many_200", |b| {
        b.iter(|| {
            h.engine
                .resolve_many(Post::KIND, black_box(historical), &EntityFilter::all())
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_resolve);
criterion_main!(benches);
