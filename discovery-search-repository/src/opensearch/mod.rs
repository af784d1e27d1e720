//! OpenSearch implementation of the search index provider.

mod index_config;
mod provider;

pub use index_config::{index_settings, SYNONYMS};
pub use provider::OpenSearchProvider;
