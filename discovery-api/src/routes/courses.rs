//! Course routes.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use discovery_shared::{Course, CourseRun};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::errors::ApiError;
use crate::pagination::{Page, PageParams, RequestUrl};
use crate::routes::{parse_uuid, partner_code, partners, ListQuery};

#[derive(Debug, Clone, Serialize)]
pub struct CourseView {
    #[serde(flatten)]
    pub course: Course,
    pub partner: String,
    pub course_runs: Vec<CourseRun>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CourseFilters {
    /// Only courses with a run that is running and open for enrollment.
    #[serde(default)]
    pub active: bool,
}

/// GET /api/v1/courses
pub async fn list_courses(
    State(state): State<AppState>,
    _user: AuthUser,
    url: RequestUrl,
    Query(query): Query<ListQuery>,
    Query(filters): Query<CourseFilters>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<CourseView>>, ApiError> {
    let keys = query.keys();
    let now = Utc::now();
    let mut views = Vec::new();

    for partner in partners(&state, query.partner.as_deref()).await? {
        let courses = if filters.active {
            state.catalog.active_courses(partner.id, now).await?
        } else {
            state.catalog.repo::<Course>().list_by_partner(partner.id).await?
        };

        let mut runs: HashMap<i64, Vec<CourseRun>> = HashMap::new();
        for run in state.catalog.repo::<CourseRun>().list_by_partner(partner.id).await? {
            runs.entry(run.course_id).or_default().push(run);
        }

        views.extend(
            courses
                .into_iter()
                .filter(|c| keys.as_ref().map_or(true, |k| k.contains(&c.key.as_str())))
                .map(|course| CourseView {
                    course_runs: runs.remove(&course.id).unwrap_or_default(),
                    partner: partner.short_code.clone(),
                    course,
                }),
        );
    }
    views.sort_by(|a, b| a.course.key.cmp(&b.course.key));

    Ok(Json(Page::slice(views, &page, state.config.page_size, &url)?))
}

/// GET /api/v1/courses/:uuid
pub async fn get_course(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(uuid): Path<String>,
) -> Result<Json<CourseView>, ApiError> {
    let uuid = parse_uuid(&uuid)?;
    let course = state
        .catalog
        .repo::<Course>()
        .get_by_uuid(uuid, false)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Course {uuid} not found")))?;

    let mut course_runs: Vec<CourseRun> = state
        .catalog
        .repo::<CourseRun>()
        .list_by_partner(course.partner_id)
        .await?
        .into_iter()
        .filter(|run| run.course_id == course.id)
        .collect();
    course_runs.sort_by_key(|run| (run.start, run.id));

    Ok(Json(CourseView {
        partner: partner_code(&state, course.partner_id).await?,
        course_runs,
        course,
    }))
}
