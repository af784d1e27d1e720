use discovery_api::JwtError;
use discovery_clients::ClientError;
use discovery_currency::CurrencyError;
use discovery_events::EventError;
use discovery_pipeline::OrchestratorError;
use discovery_repository::CatalogRepositoryError;
use discovery_search_repository::SearchIndexError;
use thiserror::Error;

/// Errors that end a command.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Catalog repository error: {0}")]
    Repository(#[from] CatalogRepositoryError),

    #[error("Search index error: {0}")]
    Search(#[from] SearchIndexError),

    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Event error: {0}")]
    Events(#[from] EventError),

    #[error("Currency error: {0}")]
    Currency(#[from] CurrencyError),

    #[error("JWT error: {0}")]
    Jwt(#[from] JwtError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl AppError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn task_failed(msg: impl Into<String>) -> Self {
        Self::TaskFailed(msg.into())
    }
}
