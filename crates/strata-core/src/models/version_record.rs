//! Immutable historical snapshots and their validity intervals.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Attributes, ContextSnapshot, EntityId, EntityRecord};
use crate::errors::StorageError;

/// Storage-assigned identity of a version record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionId(pub i64);

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The mutation a version record documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionOperation {
    /// Prior state of an entity that was then updated.
    Update,
    /// Terminal state of an entity that was then trashed.
    Delete,
    /// Restoration: covers the period the entity spent in the trash.
    Insert,
}

impl VersionOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Insert => "insert",
        }
    }
}

impl fmt::Display for VersionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionOperation {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "insert" => Ok(Self::Insert),
            other => Err(StorageError::Corrupt {
                message: format!("unknown version operation {other:?}"),
            }),
        }
    }
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Validity {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    pub fn overlaps(&self, other: &Validity) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// An immutable snapshot of a tracked entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// `None` until persisted.
    pub version_id: Option<VersionId>,
    pub kind: String,
    pub source_id: EntityId,
    pub operation: VersionOperation,
    pub validity: Validity,
    pub correlation_id: Uuid,
    pub context: ContextSnapshot,
    /// Field → value before the mutation that produced this record.
    pub changed_fields: Attributes,
    /// Full prior domain state, without the source id or generated fields.
    pub snapshot: Attributes,
    pub source_created_at: Option<DateTime<Utc>>,
    pub source_updated_at: Option<DateTime<Utc>>,
    /// Wall-clock time the record was written.
    pub recorded_at: DateTime<Utc>,
}

impl VersionRecord {
    pub fn is_persisted(&self) -> bool {
        self.version_id.is_some()
    }

    /// The snapshot as a live-shaped record with the original identifier.
    pub fn to_entity(&self) -> EntityRecord {
        EntityRecord {
            kind: self.kind.clone(),
            id: self.source_id.clone(),
            attributes: self.snapshot.clone(),
            created_at: self.source_created_at,
            updated_at: self.source_updated_at,
        }
    }
}
