//! Search index service implementation.
//!
//! Everything that reads or writes the catalog index goes through this
//! service. Readers and realtime writers address the alias; a rebuild loads
//! a fresh physical index and swaps the alias onto it once it is complete.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, instrument, warn};

use discovery_search_shared::{BoostConfig, SearchDocument, SearchRequest, SearchResponse};

use crate::config::SearchIndexServiceConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::naming::{indices_to_prune, timestamped_index_name};
use crate::opensearch::{index_settings, SYNONYMS};
use crate::types::{BatchOperationSummary, RebuildOutcome};

/// The main service for interacting with the search index.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use discovery_search_repository::{OpenSearchProvider, SearchIndexService};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = Arc::new(OpenSearchProvider::new("http://localhost:9200").await?);
/// let service = SearchIndexService::new(provider);
///
/// let outcome = service.rebuild(Vec::new()).await?;
/// service.prune_indices(None).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SearchIndexService {
    provider: Arc<dyn SearchIndexProvider>,
    config: SearchIndexServiceConfig,
}

impl SearchIndexService {
    pub fn new(provider: Arc<dyn SearchIndexProvider>) -> Self {
        Self {
            provider,
            config: SearchIndexServiceConfig::default(),
        }
    }

    pub fn with_config(
        provider: Arc<dyn SearchIndexProvider>,
        config: SearchIndexServiceConfig,
    ) -> Self {
        Self { provider, config }
    }

    pub fn alias(&self) -> &str {
        &self.config.alias
    }

    pub fn config(&self) -> &SearchIndexServiceConfig {
        &self.config
    }

    fn validate_batch_size(&self, size: usize) -> Result<(), SearchIndexError> {
        if size > self.config.max_batch_size {
            return Err(SearchIndexError::batch_size_exceeded(
                size,
                self.config.max_batch_size,
            ));
        }
        Ok(())
    }

    /// A fresh physical index name, bumped forward if the current second is taken.
    async fn next_index_name(&self) -> Result<String, SearchIndexError> {
        let existing = self.provider.list_indices(&self.config.alias).await?;
        let mut at = Utc::now();
        loop {
            let name = timestamped_index_name(&self.config.alias, at);
            if !existing.contains(&name) {
                return Ok(name);
            }
            at += Duration::seconds(1);
        }
    }

    /// Makes sure the alias resolves, creating an empty index for it if needed.
    ///
    /// Returns the physical index the alias points to.
    pub async fn ensure_alias(&self) -> Result<String, SearchIndexError> {
        if let Some(index) = self.provider.alias_target(&self.config.alias).await? {
            return Ok(index);
        }
        let index = self.next_index_name().await?;
        self.provider
            .create_index(&index, &index_settings(SYNONYMS))
            .await?;
        self.provider.swap_alias(&self.config.alias, &index).await?;
        info!(alias = %self.config.alias, index = %index, "Created index for unbound alias");
        Ok(index)
    }

    /// Load every document into a new physical index, then swap the alias.
    ///
    /// The previous index keeps serving reads until the swap. If loading
    /// fails the alias is left untouched and the half-built index stays
    /// behind for the janitor.
    #[instrument(skip(self, documents), fields(alias = %self.config.alias, documents = documents.len()))]
    pub async fn rebuild(
        &self,
        documents: Vec<SearchDocument>,
    ) -> Result<RebuildOutcome, SearchIndexError> {
        let previous = self.provider.alias_target(&self.config.alias).await?;
        let index = self.next_index_name().await?;
        self.provider
            .create_index(&index, &index_settings(SYNONYMS))
            .await?;
        info!(index = %index, "Created index for rebuild");

        let mut summary = BatchOperationSummary::default();
        for chunk in documents.chunks(self.config.max_batch_size) {
            summary.merge(self.provider.bulk_index(&index, chunk).await?);
        }
        if summary.failed > 0 {
            warn!(index = %index, failed = summary.failed, "Some documents failed to index");
        }

        self.provider.swap_alias(&self.config.alias, &index).await?;
        info!(
            index = %index,
            previous = ?previous,
            indexed = summary.succeeded,
            "Rebuild complete, alias swapped"
        );

        Ok(RebuildOutcome {
            index,
            previous,
            indexed: summary.succeeded,
            failed: summary.failed,
        })
    }

    /// Delete old physical indices, keeping the `retention` newest.
    ///
    /// The index the alias points to is never deleted. Returns the names of
    /// the deleted indices.
    #[instrument(skip(self), fields(alias = %self.config.alias))]
    pub async fn prune_indices(
        &self,
        retention: Option<usize>,
    ) -> Result<Vec<String>, SearchIndexError> {
        let retention = retention.unwrap_or(self.config.retention_limit);
        let indices = self.provider.list_indices(&self.config.alias).await?;
        let live = self.provider.alias_target(&self.config.alias).await?;

        let doomed = indices_to_prune(&self.config.alias, &indices, live.as_deref(), retention);
        for index in &doomed {
            self.provider.delete_index(index).await?;
            info!(index = %index, "Deleted stale index");
        }
        Ok(doomed)
    }

    /// Create or replace one document in the live index.
    pub async fn upsert(&self, document: &SearchDocument) -> Result<(), SearchIndexError> {
        self.provider
            .index_document(&self.config.alias, document)
            .await
    }

    /// Index several documents into the live index.
    pub async fn upsert_batch(
        &self,
        documents: &[SearchDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        self.validate_batch_size(documents.len())?;
        let index = self.ensure_alias().await?;
        self.provider.bulk_index(&index, documents).await
    }

    /// Remove a document from the live index. Missing documents are not an error.
    pub async fn delete(&self, document_id: &str) -> Result<(), SearchIndexError> {
        if document_id.is_empty() {
            return Err(SearchIndexError::validation("document_id is required"));
        }
        self.provider
            .delete_document(&self.config.alias, document_id)
            .await
    }

    pub async fn search(
        &self,
        request: &SearchRequest,
        boost: Option<&BoostConfig>,
    ) -> Result<SearchResponse, SearchIndexError> {
        self.provider
            .search(&self.config.alias, request, boost)
            .await
    }
}
