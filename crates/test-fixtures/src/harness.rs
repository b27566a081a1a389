//! Engine builders with a manual clock.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use strata_core::clock::ManualClock;
use strata_core::config::StrataConfig;
use strata_core::models::Attributes;
use strata_storage::StorageEngine;
use strata_temporal::{EntityKind, UnitOfWork, VersioningEngine};

use crate::models::{Comment, Post, User};
use strata_core::traits::Tracked;

/// 2024-01-01T00:00:00Z, where every harness clock starts.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Build an attribute map from a `json!` object literal.
pub fn attrs(value: serde_json::Value) -> Attributes {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("attrs() needs a JSON object, got {other}"),
    }
}

pub struct Harness {
    pub engine: VersioningEngine<StorageEngine>,
    pub clock: Arc<ManualClock>,
    pub uow: UnitOfWork,
    _dir: Option<TempDir>,
}

impl Harness {
    /// In-memory engine with posts → comments cascading.
    pub fn in_memory() -> Self {
        Self::in_memory_with(StrataConfig::default())
    }

    pub fn in_memory_with(config: StrataConfig) -> Self {
        let engine = VersioningEngine::open_in_memory(&config).expect("in-memory engine");
        Self::wrap(engine, None)
    }

    /// File-backed engine in a temp dir, with a read pool.
    pub fn on_disk() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("strata.db");
        let engine =
            VersioningEngine::open(&path, &StrataConfig::default()).expect("file engine");
        Self::wrap(engine, Some(dir))
    }

    fn wrap(engine: VersioningEngine<StorageEngine>, dir: Option<TempDir>) -> Self {
        let clock = Arc::new(ManualClock::new(epoch()));
        let engine = engine.with_clock(clock.clone());
        engine.register_kind(EntityKind::new(Post::KIND).cascade(Comment::KIND, "post_id"));
        engine.register_kind(EntityKind::new(Comment::KIND));
        engine.register_kind(EntityKind::new(User::KIND));
        Self {
            engine,
            clock,
            uow: UnitOfWork::new(),
            _dir: dir,
        }
    }

    /// Move the clock forward by `secs` seconds and return the new time.
    pub fn tick(&self, secs: i64) -> DateTime<Utc> {
        self.clock.advance(Duration::seconds(secs))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.engine.now()
    }
}
