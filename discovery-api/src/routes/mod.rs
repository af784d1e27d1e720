pub mod catalogs;
pub mod course_runs;
pub mod courses;
pub mod currency;
pub mod health;
pub mod organizations;
pub mod programs;
pub mod search;
pub mod users;

use discovery_shared::Partner;
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::ApiError;

/// Filters shared by the catalog listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub partner: Option<String>,
    /// Comma-separated natural keys or uuids.
    pub keys: Option<String>,
}

impl ListQuery {
    pub fn keys(&self) -> Option<Vec<&str>> {
        self.keys.as_deref().map(|keys| {
            keys.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .collect()
        })
    }
}

/// The requested partner, or every partner when none is named.
pub(crate) async fn partners(state: &AppState, short_code: Option<&str>) -> Result<Vec<Partner>, ApiError> {
    match short_code {
        Some(code) => Ok(state.catalog.get_partner(code).await?.into_iter().collect()),
        None => Ok(state.catalog.list_partners().await?),
    }
}

pub(crate) async fn partner_code(state: &AppState, partner_id: i64) -> Result<String, ApiError> {
    Ok(state
        .catalog
        .list_partners()
        .await?
        .into_iter()
        .find(|p| p.id == partner_id)
        .map(|p| p.short_code)
        .unwrap_or_default())
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(value).map_err(|_| ApiError::validation(format!("'{value}' is not a valid uuid")))
}
