//! Point-in-time resolution results, untyped and typed.

use std::ops::Deref;

use super::{EntityRecord, VersionOperation, VersionRecord};
use crate::errors::StrataResult;
use crate::traits::Tracked;

/// What represented an entity at some instant.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityState {
    /// The live row was the truth.
    Live(EntityRecord),
    /// A historical snapshot was the truth.
    Historical(VersionRecord),
}

impl EntityState {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    pub fn version(&self) -> Option<&VersionRecord> {
        match self {
            Self::Historical(v) => Some(v),
            Self::Live(_) => None,
        }
    }

    /// The state as a live-shaped record.
    pub fn to_record(&self) -> EntityRecord {
        match self {
            Self::Live(record) => record.clone(),
            Self::Historical(version) => version.to_entity(),
        }
    }

    /// Cast into the entity's Rust type.
    pub fn cast<T: Tracked>(&self) -> StrataResult<Resolved<T>> {
        match self {
            Self::Live(record) => Ok(Resolved::Live(T::from_record(record)?)),
            Self::Historical(version) => Ok(Resolved::Historical(Versioned {
                entity: T::from_record(&version.to_entity())?,
                version: version.clone(),
            })),
        }
    }
}

/// A historical snapshot cast as its entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub entity: T,
    pub version: VersionRecord,
}

impl<T> Versioned<T> {
    pub fn operation(&self) -> VersionOperation {
        self.version.operation
    }
}

impl<T> Deref for Versioned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.entity
    }
}

/// Typed counterpart of [`EntityState`].
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<T> {
    Live(T),
    Historical(Versioned<T>),
}

impl<T> Resolved<T> {
    pub fn entity(&self) -> &T {
        match self {
            Self::Live(entity) => entity,
            Self::Historical(versioned) => &versioned.entity,
        }
    }

    pub fn into_entity(self) -> T {
        match self {
            Self::Live(entity) => entity,
            Self::Historical(versioned) => versioned.entity,
        }
    }

    pub fn version(&self) -> Option<&VersionRecord> {
        match self {
            Self::Historical(versioned) => Some(&versioned.version),
            Self::Live(_) => None,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }
}
