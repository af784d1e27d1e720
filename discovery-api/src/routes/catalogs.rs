use axum::{
    extract::{Path, Query, State},
    Json,
};
use discovery_search_shared::{ContentType, SearchDocument, SearchRequest};
use tracing::debug;

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::errors::ApiError;
use crate::pagination::{Page, PageParams, RequestUrl};

/// GET /api/v1/catalogs/:id/courses
///
/// Runs the catalog's saved query restricted to course documents. Only the
/// catalog's viewers and administrators may read it.
pub async fn catalog_courses(
    State(state): State<AppState>,
    user: AuthUser,
    url: RequestUrl,
    Path(id): Path<i64>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<SearchDocument>>, ApiError> {
    let catalog = state
        .catalog
        .get_catalog(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Catalog {id} not found")))?;

    if !user.administrator && !catalog.can_view(&user.username) {
        debug!(catalog = id, user = %user.username, "Catalog access denied");
        return Err(ApiError::forbidden(format!(
            "{} may not view catalog {}",
            user.username, id
        )));
    }

    let request = SearchRequest::new(catalog.query.clone())
        .of_type(ContentType::Course)
        .paginate(page.page(), page.page_size(state.config.page_size));
    let response = state.search.search(&request, state.config.boost.as_ref()).await?;

    let documents = response.hits.into_iter().map(|hit| hit.document).collect();
    Ok(Json(Page::new(
        documents,
        response.total,
        &page,
        state.config.page_size,
        &url,
    )?))
}
