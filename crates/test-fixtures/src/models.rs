//! Tracked test models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use strata_core::models::EntityId;
use strata_core::traits::Tracked;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub status: String,
    pub user_id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn new(id: i64, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            body: String::new(),
            status: "draft".to_string(),
            user_id: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Tracked for Post {
    const KIND: &'static str = "posts";

    fn entity_id(&self) -> EntityId {
        EntityId::Integer(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub body: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn new(id: i64, post_id: i64, body: &str) -> Self {
        Self {
            id,
            post_id,
            body: body.to_string(),
            created_at: None,
            updated_at: None,
        }
    }
}

impl Tracked for Comment {
    const KIND: &'static str = "comments";

    fn entity_id(&self) -> EntityId {
        EntityId::Integer(self.id)
    }
}

/// Keyed by uuid, to exercise non-integer ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: None,
            updated_at: None,
        }
    }
}

impl Tracked for User {
    const KIND: &'static str = "users";

    fn entity_id(&self) -> EntityId {
        EntityId::Uuid(self.id)
    }
}
