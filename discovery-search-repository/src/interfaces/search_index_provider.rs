//! Search index provider trait definition.

use async_trait::async_trait;
use serde_json::Value;

use discovery_search_shared::{BoostConfig, SearchDocument, SearchRequest, SearchResponse};

use crate::errors::SearchIndexError;
use crate::types::BatchOperationSummary;

/// Abstracts the search engine (OpenSearch, or memory in tests).
///
/// Providers are injected into [`crate::SearchIndexService`]. Operations named
/// `target` accept either an alias or a physical index name.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Create a physical index with the given settings and mappings.
    ///
    /// Fails if an index with the same name already exists.
    async fn create_index(&self, index: &str, settings: &Value) -> Result<(), SearchIndexError>;

    /// Delete a physical index. Deleting a missing index is an error.
    async fn delete_index(&self, index: &str) -> Result<(), SearchIndexError>;

    /// Names of the physical indices whose name starts with `{alias}_`.
    async fn list_indices(&self, alias: &str) -> Result<Vec<String>, SearchIndexError>;

    /// The physical index the alias currently points to, if any.
    async fn alias_target(&self, alias: &str) -> Result<Option<String>, SearchIndexError>;

    /// Point the alias at `index` in a single atomic step, removing every
    /// other binding of the alias.
    async fn swap_alias(&self, alias: &str, index: &str) -> Result<(), SearchIndexError>;

    /// Index many documents into one physical index.
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - per-document outcomes; partial failures are not an error
    /// * `Err(SearchIndexError)` - if the request as a whole failed
    async fn bulk_index(
        &self,
        index: &str,
        documents: &[SearchDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError>;

    /// Create or replace a single document, keyed by its uuid.
    async fn index_document(
        &self,
        target: &str,
        document: &SearchDocument,
    ) -> Result<(), SearchIndexError>;

    /// Delete a document. A document that does not exist counts as deleted.
    async fn delete_document(&self, target: &str, document_id: &str)
        -> Result<(), SearchIndexError>;

    async fn search(
        &self,
        target: &str,
        request: &SearchRequest,
        boost: Option<&BoostConfig>,
    ) -> Result<SearchResponse, SearchIndexError>;
}
