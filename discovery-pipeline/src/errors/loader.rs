//! Error types for the loaders of the refresh pipeline.
use discovery_clients::ClientError;
use discovery_repository::CatalogRepositoryError;
use discovery_shared::ValidationError;
use thiserror::Error;

/// Errors raised while loading one source into the catalog.
///
/// `Source` aborts the loader and skips its prune phase. Every other variant
/// is scoped to a single record: it is logged, counted as failed and the
/// loader moves on.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Source error: {0}")]
    Source(#[from] ClientError),

    #[error("Catalog repository error: {0}")]
    Repository(#[from] CatalogRepositoryError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    #[error("Rejected record: {0}")]
    Rejected(String),
}

impl LoaderError {
    pub fn unresolved(msg: impl Into<String>) -> Self {
        Self::UnresolvedReference(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}
