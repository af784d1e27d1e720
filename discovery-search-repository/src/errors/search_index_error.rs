//! Search index error types.

use thiserror::Error;

/// Errors from search index operations, raised by providers and the service alike.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Index error: {0}")]
    IndexError(String),

    #[error("Bulk index error: {0}")]
    BulkIndexError(String),

    #[error("Delete error: {0}")]
    DeleteError(String),

    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    #[error("Alias error: {0}")]
    AliasError(String),

    #[error("Search error: {0}")]
    SearchError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Physical index does not exist.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Batch size {provided} exceeds maximum {max}")]
    BatchSizeExceeded { provided: usize, max: usize },
}

impl SearchIndexError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    pub fn index(msg: impl Into<String>) -> Self {
        Self::IndexError(msg.into())
    }

    pub fn bulk_index(msg: impl Into<String>) -> Self {
        Self::BulkIndexError(msg.into())
    }

    pub fn delete(msg: impl Into<String>) -> Self {
        Self::DeleteError(msg.into())
    }

    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    pub fn alias(msg: impl Into<String>) -> Self {
        Self::AliasError(msg.into())
    }

    pub fn search(msg: impl Into<String>) -> Self {
        Self::SearchError(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    pub fn index_not_found(index: &str) -> Self {
        Self::IndexNotFound(index.to_string())
    }

    pub fn batch_size_exceeded(provided: usize, max: usize) -> Self {
        Self::BatchSizeExceeded { provided, max }
    }
}

impl From<opensearch::Error> for SearchIndexError {
    fn from(e: opensearch::Error) -> Self {
        Self::ConnectionError(e.to_string())
    }
}

impl From<serde_json::Error> for SearchIndexError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}
