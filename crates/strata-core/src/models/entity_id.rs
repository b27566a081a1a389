//! Type-preserving entity identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::StorageError;

/// Identifier of a tracked entity. The variant survives storage round trips,
/// so an integer id never comes back as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EntityId {
    Integer(i64),
    Uuid(Uuid),
    Text(String),
}

impl EntityId {
    /// Storage tag for the variant.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Uuid(_) => "uuid",
            Self::Text(_) => "text",
        }
    }

    /// Canonical key used for equality lookups in storage.
    pub fn key(&self) -> String {
        match self {
            Self::Integer(i) => i.to_string(),
            Self::Uuid(u) => u.hyphenated().to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    /// Rebuild an id from its storage tag and key.
    pub fn from_parts(type_tag: &str, key: &str) -> Result<Self, StorageError> {
        let corrupt = |detail: String| StorageError::Corrupt {
            message: format!("entity id {key:?} ({type_tag}): {detail}"),
        };
        match type_tag {
            "integer" => key
                .parse::<i64>()
                .map(Self::Integer)
                .map_err(|e| corrupt(e.to_string())),
            "uuid" => Uuid::parse_str(key)
                .map(Self::Uuid)
                .map_err(|e| corrupt(e.to_string())),
            "text" => Ok(Self::Text(key.to_string())),
            other => Err(corrupt(format!("unknown id type {other}"))),
        }
    }

    /// The id as it appears inside another entity's attributes
    /// (for example a child's foreign key).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Integer(i) => serde_json::Value::from(*i),
            other => serde_json::Value::String(other.key()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Uuid> for EntityId {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
