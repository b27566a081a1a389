//! Per-unit-of-work context: override frames, correlation slot, transaction depth.

mod guard;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use strata_core::config::{VersioningConfig, VersioningSettings};
use strata_core::models::{ContextOverrides, ContextSnapshot};

pub use guard::ContextGuard;

/// Context handle for one logical unit of work.
///
/// Each thread or task owns its own `UnitOfWork`; nothing in it is shared,
/// so overrides made by one unit can never be observed by another.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    base: ContextOverrides,
    frames: Vec<ContextOverrides>,
    pub(crate) generated_correlation: Option<Uuid>,
    pub(crate) transaction_depth: usize,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// A unit of work whose outermost frame is `base`.
    pub fn with_base(base: ContextOverrides) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }

    /// The effective overrides: every open frame merged over the base.
    pub fn current(&self) -> &ContextOverrides {
        self.frames.last().unwrap_or(&self.base)
    }

    /// Push `overrides` for as long as the returned guard lives.
    pub fn scoped(&mut self, overrides: ContextOverrides) -> ContextGuard<'_> {
        let depth = self.push_frame(&overrides);
        ContextGuard::new(self, depth)
    }

    /// Run `f` with `overrides` applied. The previous frame is restored on
    /// every exit path, panics included.
    pub fn with_context<R>(
        &mut self,
        overrides: ContextOverrides,
        f: impl FnOnce(&mut UnitOfWork) -> R,
    ) -> R {
        let mut guard = self.scoped(overrides);
        f(&mut *guard)
    }

    /// Returns the depth to restore to.
    pub(crate) fn push_frame(&mut self, overrides: &ContextOverrides) -> usize {
        let depth = self.frames.len();
        let merged = self.current().merged(overrides);
        self.frames.push(merged);
        depth
    }

    pub(crate) fn restore_depth(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Switches for a mutation of `kind`: frame > per-kind > global.
    pub fn effective_settings(&self, config: &VersioningConfig, kind: &str) -> VersioningSettings {
        self.current().versioning.apply(config.settings_for(kind))
    }

    pub fn now_override(&self) -> Option<DateTime<Utc>> {
        self.current().now_override()
    }

    /// Resolve the context attached to a version written right now.
    /// Deferred providers are invoked here.
    pub fn context_snapshot(&self) -> ContextSnapshot {
        let current = self.current();
        ContextSnapshot {
            actor: current.actor.as_ref().map(|v| v.resolve()),
            note: current.note.clone(),
            metadata: current.metadata.as_ref().map(|v| v.resolve()),
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction_depth > 0
    }

    pub(crate) fn enter_transaction(&mut self) {
        self.transaction_depth += 1;
    }

    pub(crate) fn exit_transaction(&mut self) {
        self.transaction_depth = self.transaction_depth.saturating_sub(1);
    }
}
