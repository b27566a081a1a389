//! Uniform read access over live rows and historical snapshots.

use chrono::{DateTime, Utc};

use crate::models::{Attributes, EntityId, EntityRecord, EntityState, VersionRecord};

/// Lets resolver callers treat live and historical instances alike.
pub trait AttributeAccess {
    fn kind(&self) -> &str;
    fn source_id(&self) -> &EntityId;
    fn attributes(&self) -> &Attributes;
    fn created_at(&self) -> Option<DateTime<Utc>>;

    fn attribute(&self, field: &str) -> Option<&serde_json::Value> {
        self.attributes().get(field)
    }
}

impl AttributeAccess for EntityRecord {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn source_id(&self) -> &EntityId {
        &self.id
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

impl AttributeAccess for VersionRecord {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn source_id(&self) -> &EntityId {
        &self.source_id
    }

    fn attributes(&self) -> &Attributes {
        &self.snapshot
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.source_created_at
    }
}

impl AttributeAccess for EntityState {
    fn kind(&self) -> &str {
        match self {
            Self::Live(r) => r.kind(),
            Self::Historical(v) => v.kind(),
        }
    }

    fn source_id(&self) -> &EntityId {
        match self {
            Self::Live(r) => r.source_id(),
            Self::Historical(v) => v.source_id(),
        }
    }

    fn attributes(&self) -> &Attributes {
        match self {
            Self::Live(r) => r.attributes(),
            Self::Historical(v) => v.attributes(),
        }
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Live(r) => r.created_at,
            Self::Historical(v) => v.source_created_at,
        }
    }
}
