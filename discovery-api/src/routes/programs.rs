use axum::{
    extract::{Path, Query, State},
    Json,
};
use discovery_shared::{CourseRun, Program, ProgramStatus};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::errors::ApiError;
use crate::pagination::{Page, PageParams, RequestUrl};
use crate::routes::{parse_uuid, partners, ListQuery};

#[derive(Debug, Default, Deserialize)]
pub struct ProgramFilters {
    /// One of `unpublished`, `active`, `retired`, `deleted`.
    pub status: Option<String>,
    /// Program type slug, e.g. `micromasters`.
    #[serde(rename = "type")]
    pub program_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgramView {
    #[serde(flatten)]
    pub program: Program,
    /// Runs of the program's courses minus the excluded ones.
    pub course_runs: Vec<CourseRun>,
}

/// GET /api/v1/programs
pub async fn list_programs(
    State(state): State<AppState>,
    _user: AuthUser,
    url: RequestUrl,
    Query(query): Query<ListQuery>,
    Query(filters): Query<ProgramFilters>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<Program>>, ApiError> {
    let status = match filters.status.as_deref() {
        Some(value) => Some(
            ProgramStatus::parse(value)
                .ok_or_else(|| ApiError::validation(format!("Unknown program status '{value}'")))?,
        ),
        None => None,
    };
    let uuids = query.keys();

    let mut programs = Vec::new();
    for partner in partners(&state, query.partner.as_deref()).await? {
        programs.extend(
            state
                .catalog
                .repo::<Program>()
                .list_by_partner(partner.id)
                .await?
                .into_iter()
                .filter(|p| status.map_or(true, |s| p.status == s))
                .filter(|p| filters.program_type.as_deref().map_or(true, |t| p.is_type(t)))
                .filter(|p| {
                    uuids
                        .as_ref()
                        .map_or(true, |u| u.contains(&p.uuid.to_string().as_str()))
                }),
        );
    }
    programs.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));

    Ok(Json(Page::slice(programs, &page, state.config.page_size, &url)?))
}

/// GET /api/v1/programs/:uuid
pub async fn get_program(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(uuid): Path<String>,
) -> Result<Json<ProgramView>, ApiError> {
    let uuid = parse_uuid(&uuid)?;
    let program = state
        .catalog
        .repo::<Program>()
        .get_by_uuid(uuid, false)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Program {uuid} not found")))?;
    let course_runs = state.catalog.resolved_program_runs(&program).await?;
    Ok(Json(ProgramView { program, course_runs }))
}
