use axum::{
    extract::{Path, Query, State},
    Json,
};
use discovery_shared::{CourseRun, Scope};
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::errors::ApiError;
use crate::pagination::{Page, PageParams, RequestUrl};
use crate::routes::{partners, ListQuery};

#[derive(Debug, Default, Deserialize)]
pub struct CourseRunFilters {
    /// Hide runs flagged hidden.
    #[serde(default)]
    pub hide_hidden: bool,
}

/// GET /api/v1/course_runs
pub async fn list_course_runs(
    State(state): State<AppState>,
    _user: AuthUser,
    url: RequestUrl,
    Query(query): Query<ListQuery>,
    Query(filters): Query<CourseRunFilters>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<CourseRun>>, ApiError> {
    let keys = query.keys();
    let mut runs = Vec::new();
    for partner in partners(&state, query.partner.as_deref()).await? {
        runs.extend(
            state
                .catalog
                .repo::<CourseRun>()
                .list_by_partner(partner.id)
                .await?
                .into_iter()
                .filter(|r| keys.as_ref().map_or(true, |k| k.contains(&r.key.as_str())))
                .filter(|r| !(filters.hide_hidden && r.hidden)),
        );
    }
    runs.sort_by(|a, b| a.key.cmp(&b.key));

    Ok(Json(Page::slice(runs, &page, state.config.page_size, &url)?))
}

/// GET /api/v1/course_runs/:key
///
/// Run keys are unique across partners.
pub async fn get_course_run(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(key): Path<String>,
) -> Result<Json<CourseRun>, ApiError> {
    state
        .catalog
        .repo::<CourseRun>()
        .get_by_natural_key(Scope::Global, &key, false)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Course run {key} not found")))
}
