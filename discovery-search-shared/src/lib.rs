//! # Discovery Search Shared
//!
//! Types shared by everything that writes to or reads from the catalog search
//! index: the indexed document, the search request and response, the query
//! cleanup pass, query construction and the relevance boost configuration.

pub mod boost;
pub mod query;
pub mod types;

pub use boost::BoostConfig;
pub use query::{build_search_body, normalize_query, FACET_FIELDS};
pub use types::document::render_text;
pub use types::{
    ContentType, FacetCount, SearchDocument, SearchHit, SearchRequest, SearchResponse,
};
