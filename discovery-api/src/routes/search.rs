//! Faceted search across every content type.

use std::collections::BTreeMap;

use axum::{
    extract::{Query, RawQuery, State},
    Json,
};
use discovery_search_shared::{ContentType, FacetCount, SearchDocument, SearchRequest, FACET_FIELDS};
use serde::Serialize;

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::errors::ApiError;
use crate::pagination::{Page, PageParams, RequestUrl};

#[derive(Debug, Serialize)]
pub struct FacetedPage {
    #[serde(flatten)]
    pub page: Page<SearchDocument>,
    pub facets: BTreeMap<String, Vec<FacetCount>>,
}

/// Reads `q`, `partner`, `hide_hidden`, `content_type` and `selected_facets` from the query string.
///
/// `content_type` and `selected_facets` may repeat. A selected facet is
/// `field:value`; the value may itself contain colons.
pub fn parse_search_query(raw: Option<&str>) -> Result<SearchRequest, ApiError> {
    let mut request = SearchRequest::new("").with_facets();
    let Some(raw) = raw else {
        return Ok(request);
    };

    for (name, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        match name.as_ref() {
            "q" => request.query = value.into_owned(),
            "partner" => request.partner = Some(value.into_owned()).filter(|p| !p.is_empty()),
            "hide_hidden" => request.hide_hidden = matches!(value.as_ref(), "true" | "1"),
            "content_type" => {
                for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                    let content_type = ContentType::parse(part)
                        .ok_or_else(|| ApiError::validation(format!("Unknown content type '{part}'")))?;
                    request.content_types.push(content_type);
                }
            }
            "selected_facets" => {
                let (field, selected) = value
                    .split_once(':')
                    .ok_or_else(|| ApiError::validation(format!("Malformed facet '{value}'")))?;
                if !FACET_FIELDS.contains(&field) {
                    return Err(ApiError::validation(format!("Unknown facet field '{field}'")));
                }
                request.filters.insert(field.to_string(), selected.to_string());
            }
            _ => {}
        }
    }
    Ok(request)
}

/// GET /api/v1/search/all
pub async fn search_all(
    State(state): State<AppState>,
    _user: AuthUser,
    url: RequestUrl,
    RawQuery(raw): RawQuery,
    Query(page): Query<PageParams>,
) -> Result<Json<FacetedPage>, ApiError> {
    let request = parse_search_query(raw.as_deref())?
        .paginate(page.page(), page.page_size(state.config.page_size));
    let response = state.search.search(&request, state.config.boost.as_ref()).await?;

    let documents = response.hits.into_iter().map(|hit| hit.document).collect();
    Ok(Json(FacetedPage {
        page: Page::new(documents, response.total, &page, state.config.page_size, &url)?,
        facets: response.facets,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repeated_facets_and_types() {
        let request = parse_search_query(Some(
            "q=python&content_type=course_run,program&selected_facets=organizations%3AMITx%3A+MIT&selected_facets=pacing_type%3Aself_paced",
        ))
        .unwrap();
        assert_eq!(request.query, "python");
        assert_eq!(
            request.content_types,
            vec![ContentType::CourseRun, ContentType::Program]
        );
        assert_eq!(request.filters["organizations"], "MITx: MIT");
        assert_eq!(request.filters["pacing_type"], "self_paced");
        assert!(request.facets);
        assert!(!request.hide_hidden);
    }

    #[test]
    fn test_parse_hide_hidden() {
        assert!(parse_search_query(Some("q=python&hide_hidden=true")).unwrap().hide_hidden);
        assert!(parse_search_query(Some("hide_hidden=1")).unwrap().hide_hidden);
        assert!(!parse_search_query(Some("hide_hidden=false")).unwrap().hide_hidden);
    }

    #[test]
    fn test_unknown_facet_or_type_is_rejected() {
        assert!(parse_search_query(Some("selected_facets=color%3Ablue")).is_err());
        assert!(parse_search_query(Some("content_type=video")).is_err());
    }
}
