//! Mapping between Rust entity types and [`EntityRecord`].

use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::Serialize;

use crate::clock::to_precision;
use crate::errors::StrataResult;
use crate::models::{Attributes, EntityId, EntityRecord};

/// A Rust type whose instances are tracked entities.
///
/// The default conversions go through serde: the id and timestamp fields are
/// lifted out of the serialized object, everything else becomes an attribute.
pub trait Tracked: Serialize + DeserializeOwned {
    /// Kind name used in storage.
    const KIND: &'static str;
    const ID_FIELD: &'static str = "id";
    const CREATED_AT_FIELD: &'static str = "created_at";
    const UPDATED_AT_FIELD: &'static str = "updated_at";

    fn entity_id(&self) -> EntityId;

    fn to_record(&self) -> StrataResult<EntityRecord> {
        let mut attributes = match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(serde_json::Error::custom(format!(
                    "{} must serialize to an object, got {other}",
                    Self::KIND
                ))
                .into())
            }
        };
        attributes.remove(Self::ID_FIELD);
        let created_at = take_timestamp(&mut attributes, Self::CREATED_AT_FIELD)?;
        let updated_at = take_timestamp(&mut attributes, Self::UPDATED_AT_FIELD)?;
        Ok(EntityRecord {
            kind: Self::KIND.to_string(),
            id: self.entity_id(),
            attributes,
            created_at,
            updated_at,
        })
    }

    fn from_record(record: &EntityRecord) -> StrataResult<Self> {
        let mut map = record.attributes.clone();
        map.insert(Self::ID_FIELD.to_string(), record.id.to_json());
        map.insert(
            Self::CREATED_AT_FIELD.to_string(),
            serde_json::to_value(record.created_at)?,
        );
        map.insert(
            Self::UPDATED_AT_FIELD.to_string(),
            serde_json::to_value(record.updated_at)?,
        );
        Ok(serde_json::from_value(serde_json::Value::Object(map))?)
    }
}

fn take_timestamp(attributes: &mut Attributes, field: &str) -> StrataResult<Option<DateTime<Utc>>> {
    match attributes.remove(field) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => {
            let ts: DateTime<Utc> = serde_json::from_value(value)?;
            Ok(Some(to_precision(ts)))
        }
    }
}
