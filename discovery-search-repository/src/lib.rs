//! # Discovery Search Repository
//!
//! Traits and implementations for the catalog search index. The live index
//! is always addressed through a stable alias; physical indices are named
//! `{alias}_{YYYYMMDDHHMMSS}` and a rebuild swaps the alias to a freshly
//! loaded index in one atomic step. The janitor removes old physical indices
//! and never touches the one the alias points to.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod naming;
pub mod opensearch;
pub mod service;
pub mod types;

pub use config::SearchIndexServiceConfig;
pub use errors::SearchIndexError;
pub use interfaces::SearchIndexProvider;
pub use memory::InMemorySearchProvider;
pub use naming::{indices_to_prune, parse_index_timestamp, timestamped_index_name};
pub use opensearch::{index_settings, OpenSearchProvider, SYNONYMS};
pub use service::SearchIndexService;
pub use types::{BatchOperationResult, BatchOperationSummary, RebuildOutcome};
