use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use discovery_currency::ExchangeRateService;
use discovery_repository::CatalogService;
use discovery_search_repository::SearchIndexService;
use discovery_search_shared::BoostConfig;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::auth::JwtValidator;
use crate::pagination::DEFAULT_PAGE_SIZE;
use crate::routes::{catalogs, course_runs, courses, currency, health, organizations, programs, search, users};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub page_size: usize,
    /// The only identity allowed to replace usernames.
    pub username_replacement_worker: Option<String>,
    pub boost: Option<BoostConfig>,
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            username_replacement_worker: None,
            boost: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub search: SearchIndexService,
    pub rates: Arc<ExchangeRateService>,
    pub jwt: Arc<JwtValidator>,
    pub config: Arc<ApiConfig>,
}

pub fn create_app(state: AppState) -> Router {
    let timeout = state.config.request_timeout;

    let api = Router::new()
        .route("/courses", get(courses::list_courses))
        .route("/courses/:uuid", get(courses::get_course))
        .route("/course_runs", get(course_runs::list_course_runs))
        .route("/course_runs/:key", get(course_runs::get_course_run))
        .route("/programs", get(programs::list_programs))
        .route("/programs/:uuid", get(programs::get_program))
        .route("/organizations", get(organizations::list_organizations))
        .route("/organizations/:uuid", get(organizations::get_organization))
        .route("/catalogs/:id/courses", get(catalogs::catalog_courses))
        .route("/currency", get(currency::get_currency))
        .route("/search/all", get(search::search_all))
        .route("/replace_usernames", post(users::replace_usernames));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .with_state(state)
}
