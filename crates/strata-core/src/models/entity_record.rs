//! The live, mutable form of a tracked entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EntityId;

/// Domain attributes of an entity, keyed by field name.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// A row in the live set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Entity type name, e.g. `"posts"`.
    pub kind: String,
    pub id: EntityId,
    /// Domain attributes. Never contains the id.
    pub attributes: Attributes,
    /// Anchors the first validity interval.
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl EntityRecord {
    pub fn new(kind: impl Into<String>, id: impl Into<EntityId>, attributes: Attributes) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            attributes,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.attributes.get(field)
    }
}
