//! Contextual metadata attached to versions at write time.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::to_precision;
use crate::config::VersioningOverrides;

type Provider = Arc<dyn Fn() -> serde_json::Value + Send + Sync>;

/// A context value, either fixed or produced on demand.
///
/// Deferred values are resolved when a version is written, not when the
/// context is set.
#[derive(Clone)]
pub enum ContextValue {
    Static(serde_json::Value),
    Deferred(Provider),
}

impl ContextValue {
    pub fn deferred<F>(provider: F) -> Self
    where
        F: Fn() -> serde_json::Value + Send + Sync + 'static,
    {
        Self::Deferred(Arc::new(provider))
    }

    pub fn resolve(&self) -> serde_json::Value {
        match self {
            Self::Static(value) => value.clone(),
            Self::Deferred(provider) => provider(),
        }
    }
}

impl fmt::Debug for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<serde_json::Value> for ContextValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Static(value)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        Self::Static(value.into())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        Self::Static(value.into())
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        Self::Static(value.into())
    }
}

/// One frame of per-call overrides. Unset fields fall through to the
/// enclosing frame, then to configuration.
#[derive(Debug, Clone, Default)]
pub struct ContextOverrides {
    pub versioning: VersioningOverrides,
    pub actor: Option<ContextValue>,
    pub note: Option<String>,
    pub metadata: Option<ContextValue>,
    pub correlation_id: Option<Uuid>,
    /// Back-dating override for the upper bound of new versions. Only set
    /// through [`ContextOverrides::now`], which truncates it.
    now: Option<DateTime<Utc>>,
}

impl ContextOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.versioning.enabled = Some(enabled);
        self
    }

    pub fn version_on_update(mut self, version_on_update: bool) -> Self {
        self.versioning.version_on_update = Some(version_on_update);
        self
    }

    pub fn preserve_on_delete(mut self, preserve_on_delete: bool) -> Self {
        self.versioning.preserve_on_delete = Some(preserve_on_delete);
        self
    }

    pub fn actor(mut self, actor: impl Into<ContextValue>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn actor_with<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> serde_json::Value + Send + Sync + 'static,
    {
        self.actor = Some(ContextValue::deferred(provider));
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn metadata(mut self, metadata: impl Into<ContextValue>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    pub fn metadata_with<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> serde_json::Value + Send + Sync + 'static,
    {
        self.metadata = Some(ContextValue::deferred(provider));
        self
    }

    pub fn correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(to_precision(now));
        self
    }

    pub fn now_override(&self) -> Option<DateTime<Utc>> {
        self.now
    }

    /// Merge `inner` over `self`; fields set on `inner` win.
    pub fn merged(&self, inner: &ContextOverrides) -> ContextOverrides {
        ContextOverrides {
            versioning: self.versioning.merged(&inner.versioning),
            actor: inner.actor.clone().or_else(|| self.actor.clone()),
            note: inner.note.clone().or_else(|| self.note.clone()),
            metadata: inner.metadata.clone().or_else(|| self.metadata.clone()),
            correlation_id: inner.correlation_id.or(self.correlation_id),
            now: inner.now.or(self.now),
        }
    }
}

/// Context captured on a version record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSnapshot {
    pub actor: Option<serde_json::Value>,
    pub note: Option<String>,
    pub metadata: Option<serde_json::Value>,
}
