use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{CatalogEntity, EntityKind, Scope};

/// A content-producing institution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: i64,
    pub uuid: Uuid,
    pub partner_id: i64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub key: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub description_es: Option<String>,
    pub homepage_url: Option<String>,
    pub logo_image_url: Option<String>,
    pub banner_image_url: Option<String>,
    pub certificate_logo_image_url: Option<String>,
    pub marketing_url_path: Option<String>,
    pub organization_hex_color: Option<String>,
}

impl Organization {
    /// `"{key}: {name}"`, the form organizations take in search documents.
    pub fn display_label(&self) -> String {
        match &self.name {
            Some(name) => format!("{}: {}", self.key, name),
            None => self.key.clone(),
        }
    }
}

impl CatalogEntity for Organization {
    const KIND: EntityKind = EntityKind::Organization;

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
        self.key.clone()
    }
}
