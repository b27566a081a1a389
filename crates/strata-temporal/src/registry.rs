//! Registered entity kinds: generated fields and cascade rules.

use std::collections::BTreeMap;

/// Dependents trashed together with a parent: live `child_kind` rows whose
/// `foreign_key` attribute holds the parent's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeRule {
    pub child_kind: String,
    pub foreign_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityKind {
    pub name: String,
    /// Store-computed fields. Never snapshotted, never written back.
    pub generated_fields: Vec<String>,
    pub cascades: Vec<CascadeRule>,
}

impl EntityKind {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generated_fields: Vec::new(),
            cascades: Vec::new(),
        }
    }

    pub fn generated<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.generated_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn cascade(mut self, child_kind: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        self.cascades.push(CascadeRule {
            child_kind: child_kind.into(),
            foreign_key: foreign_key.into(),
        });
        self
    }

    pub fn is_generated(&self, field: &str) -> bool {
        self.generated_fields.iter().any(|f| f == field)
    }
}

#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    kinds: BTreeMap<String, EntityKind>,
}

impl KindRegistry {
    /// Registering a kind twice replaces the earlier registration.
    pub fn register(&mut self, kind: EntityKind) {
        self.kinds.insert(kind.name.clone(), kind);
    }

    pub fn get(&self, name: &str) -> Option<&EntityKind> {
        self.kinds.get(name)
    }

    pub fn is_generated(&self, kind: &str, field: &str) -> bool {
        self.get(kind).is_some_and(|k| k.is_generated(field))
    }

    pub fn cascades(&self, kind: &str) -> &[CascadeRule] {
        self.get(kind).map_or(&[], |k| k.cascades.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kinds_have_no_rules() {
        let registry = KindRegistry::default();
        assert!(registry.cascades("post").is_empty());
        assert!(!registry.is_generated("post", "search_vector"));
    }

    #[test]
    fn registration_replaces() {
        let mut registry = KindRegistry::default();
        registry.register(EntityKind::new("post").cascade("comment", "post_id"));
        registry.register(EntityKind::new("post").generated(["search_vector"]));
        assert!(registry.cascades("post").is_empty());
        assert!(registry.is_generated("post", "search_vector"));
    }
}
