//! Predicates for set-level point-in-time queries.

use serde::{Deserialize, Serialize};

use super::{Attributes, EntityId};

/// Optional filter applied to the *resolved* state of each entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityFilter {
    /// Only these ids.
    pub ids: Option<Vec<EntityId>>,
    /// Every listed field must equal the given value.
    pub equals: Option<Vec<(String, serde_json::Value)>>,
}

impl EntityFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn ids<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<EntityId>,
    {
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn field_eq(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.equals
            .get_or_insert_with(Vec::new)
            .push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, id: &EntityId, attributes: &Attributes) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(id) {
                return false;
            }
        }
        if let Some(equals) = &self.equals {
            if !equals
                .iter()
                .all(|(field, value)| attributes.get(field) == Some(value))
            {
                return false;
            }
        }
        true
    }
}
