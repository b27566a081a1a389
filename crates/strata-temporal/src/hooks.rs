//! Lifecycle hooks. A hook returning `Err` aborts the enclosing transaction.

use std::fmt;
use std::sync::Arc;

use strata_core::models::{EntityId, EntityRecord, VersionRecord};
use strata_core::{StrataError, StrataResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    /// A version record is about to be persisted. It has no id yet.
    BeforeVersion,
    /// A version record was persisted.
    AfterVersion,
    /// A live entity was reverted to an update record.
    AfterReverted,
    /// A trashed entity was restored from its delete record.
    AfterUntrashed,
}

impl HookPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeVersion => "before_version",
            Self::AfterVersion => "after_version",
            Self::AfterReverted => "after_reverted",
            Self::AfterUntrashed => "after_untrashed",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a hook sees.
#[derive(Debug, Clone, Copy)]
pub struct HookEvent<'a> {
    pub point: HookPoint,
    pub kind: &'a str,
    pub source_id: &'a EntityId,
    pub version: &'a VersionRecord,
    /// The live entity involved, when there is one.
    pub entity: Option<&'a EntityRecord>,
}

pub type HookFn = Arc<dyn Fn(&HookEvent<'_>) -> Result<(), String> + Send + Sync>;

#[derive(Clone)]
struct Hook {
    point: HookPoint,
    kind: Option<String>,
    callback: HookFn,
}

/// Registered hooks in registration order.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: Vec<Hook>,
}

impl HookRegistry {
    pub fn register<F>(&mut self, point: HookPoint, kind: Option<String>, callback: F)
    where
        F: Fn(&HookEvent<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.hooks.push(Hook {
            point,
            kind,
            callback: Arc::new(callback),
        });
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every matching hook; the first error stops the chain.
    pub fn fire(&self, event: &HookEvent<'_>) -> StrataResult<()> {
        for hook in &self.hooks {
            if hook.point != event.point {
                continue;
            }
            if hook.kind.as_deref().is_some_and(|k| k != event.kind) {
                continue;
            }
            (hook.callback)(event).map_err(|reason| StrataError::HookAborted {
                hook: event.point.to_string(),
                reason,
            })?;
        }
        Ok(())
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
