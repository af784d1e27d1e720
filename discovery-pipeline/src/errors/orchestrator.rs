//! Error types for the refresh orchestrator and the index jobs.
use discovery_clients::ClientError;
use discovery_repository::CatalogRepositoryError;
use discovery_search_repository::SearchIndexError;
use thiserror::Error;

/// Errors that stop a whole task rather than a single loader.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Catalog repository error: {0}")]
    Repository(#[from] CatalogRepositoryError),

    #[error("Source configuration error: {0}")]
    Sources(#[from] ClientError),

    #[error("Search index error: {0}")]
    Search(#[from] SearchIndexError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Task error: {0}")]
    Task(String),
}

impl OrchestratorError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
