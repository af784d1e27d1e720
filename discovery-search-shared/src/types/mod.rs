//! Document, request and response types.

pub mod document;
pub mod search;

pub use document::{ContentType, SearchDocument};
pub use search::{FacetCount, SearchHit, SearchRequest, SearchResponse};
