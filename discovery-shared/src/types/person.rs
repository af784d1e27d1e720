use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{CatalogEntity, EntityKind, Scope};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub title: String,
    pub organization_id: Option<i64>,
    /// Used when the organization is not in the catalog.
    pub organization_override: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialNetwork {
    pub kind: String,
    pub url: String,
    pub title: Option<String>,
}

/// Staff or instructor profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub uuid: Uuid,
    pub partner_id: i64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub given_name: String,
    pub family_name: Option<String>,
    pub bio: Option<String>,
    pub profile_image_url: Option<String>,
    pub position: Option<Position>,
    pub social_networks: Vec<SocialNetwork>,
    pub areas_of_expertise: Vec<String>,
}

impl Person {
    pub fn full_name(&self) -> String {
        match &self.family_name {
            Some(family) => format!("{} {}", self.given_name, family),
            None => self.given_name.clone(),
        }
    }
}

impl CatalogEntity for Person {
    const KIND: EntityKind = EntityKind::Person;

    fn id(&self) -> i64 {
        self.id
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn scope(&self) -> Scope {
        Scope::Partner(self.partner_id)
    }

    fn natural_key(&self) -> String {
        self.uuid.to_string()
    }
}
