//! # Discovery API
//!
//! Read REST API over the course catalog: courses, course runs, programs,
//! organizations, catalog queries, currency rates and faceted search, plus
//! the username replacement endpoint used by the account retirement worker.
//! Every `/api/v1` route requires a bearer JWT. Listings are paginated by
//! page number.

pub mod app;
pub mod auth;
pub mod errors;
pub mod pagination;
pub mod routes;

pub use app::{create_app, ApiConfig, AppState};
pub use auth::{AuthUser, Claims, JwtError, JwtSettings, JwtValidator};
pub use errors::ApiError;
pub use pagination::{Page, PageParams, RequestUrl, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
