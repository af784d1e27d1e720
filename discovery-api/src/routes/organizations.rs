use axum::{
    extract::{Path, Query, State},
    Json,
};
use discovery_shared::Organization;

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::errors::ApiError;
use crate::pagination::{Page, PageParams, RequestUrl};
use crate::routes::{parse_uuid, partners, ListQuery};

/// GET /api/v1/organizations
pub async fn list_organizations(
    State(state): State<AppState>,
    _user: AuthUser,
    url: RequestUrl,
    Query(query): Query<ListQuery>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<Organization>>, ApiError> {
    let keys = query.keys();
    let mut organizations = Vec::new();
    for partner in partners(&state, query.partner.as_deref()).await? {
        organizations.extend(
            state
                .catalog
                .repo::<Organization>()
                .list_by_partner(partner.id)
                .await?
                .into_iter()
                .filter(|o| keys.as_ref().map_or(true, |k| k.contains(&o.key.as_str()))),
        );
    }
    organizations.sort_by(|a, b| a.key.cmp(&b.key));

    Ok(Json(Page::slice(organizations, &page, state.config.page_size, &url)?))
}

/// GET /api/v1/organizations/:uuid
pub async fn get_organization(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(uuid): Path<String>,
) -> Result<Json<Organization>, ApiError> {
    let uuid = parse_uuid(&uuid)?;
    state
        .catalog
        .repo::<Organization>()
        .get_by_uuid(uuid, false)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Organization {uuid} not found")))
}
