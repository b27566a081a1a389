//! Versioning switches: global values plus per-kind overrides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Process-wide versioning configuration.
///
/// Per-call overrides (see the unit-of-work context) shadow per-kind entries,
/// which shadow the global values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VersioningConfig {
    /// Master switch. When false no version records are written.
    pub enabled: bool,
    /// Whether updates produce `update` version records.
    pub version_on_update: bool,
    /// When false, deleting an entity purges its history instead of trashing it.
    pub preserve_on_delete: bool,
    /// Per-kind overrides, keyed by kind name.
    pub entities: BTreeMap<String, VersioningOverrides>,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            version_on_update: true,
            preserve_on_delete: true,
            entities: BTreeMap::new(),
        }
    }
}

/// Optional values layered over a lower-precedence configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersioningOverrides {
    pub enabled: Option<bool>,
    pub version_on_update: Option<bool>,
    pub preserve_on_delete: Option<bool>,
}

/// Fully resolved switches for one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersioningSettings {
    pub enabled: bool,
    pub version_on_update: bool,
    pub preserve_on_delete: bool,
}

impl VersioningOverrides {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none() && self.version_on_update.is_none() && self.preserve_on_delete.is_none()
    }

    /// Layer `self` over `base`; set fields win.
    pub fn apply(&self, base: VersioningSettings) -> VersioningSettings {
        VersioningSettings {
            enabled: self.enabled.unwrap_or(base.enabled),
            version_on_update: self.version_on_update.unwrap_or(base.version_on_update),
            preserve_on_delete: self.preserve_on_delete.unwrap_or(base.preserve_on_delete),
        }
    }

    /// Merge `other` over `self`; fields set on `other` win.
    pub fn merged(&self, other: &VersioningOverrides) -> VersioningOverrides {
        VersioningOverrides {
            enabled: other.enabled.or(self.enabled),
            version_on_update: other.version_on_update.or(self.version_on_update),
            preserve_on_delete: other.preserve_on_delete.or(self.preserve_on_delete),
        }
    }
}

impl VersioningConfig {
    pub fn global(&self) -> VersioningSettings {
        VersioningSettings {
            enabled: self.enabled,
            version_on_update: self.version_on_update,
            preserve_on_delete: self.preserve_on_delete,
        }
    }

    /// Settings for `kind`: per-kind entry over the global values.
    pub fn settings_for(&self, kind: &str) -> VersioningSettings {
        match self.entities.get(kind) {
            Some(overrides) => overrides.apply(self.global()),
            None => self.global(),
        }
    }

    /// Mutable per-kind overrides, created on first use.
    pub fn entity_mut(&mut self, kind: &str) -> &mut VersioningOverrides {
        self.entities.entry(kind.to_string()).or_default()
    }
}
