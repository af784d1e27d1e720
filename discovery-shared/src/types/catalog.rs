use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{CatalogEntity, EntityKind, Scope};

/// A named, saved search restricted to a set of viewers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub id: i64,
    pub uuid: Uuid,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub name: String,
    pub query: String,
    pub viewers: Vec<String>,
}

impl Catalog {
    pub fn can_view(&self, username: &str) -> bool {
        self.viewers.iter().any(|v| v == username)
    }
}

impl CatalogEntity for Catalog {
    const KIND: EntityKind = EntityKind::Catalog;

    fn id(&self) -> i64 {
        self.id
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn scope(&self) -> Scope {
        Scope::Global
    }

    fn natural_key(&self) -> String {
        self.name.clone()
    }
}
