use discovery_shared::ValidationError;
use thiserror::Error;

/// Errors raised by catalog stores and the catalog service.
#[derive(Debug, Error)]
pub enum CatalogRepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Delete blocked: {0}")]
    DeleteBlocked(String),
}

impl CatalogRepositoryError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn delete_blocked(msg: impl Into<String>) -> Self {
        Self::DeleteBlocked(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationError(_))
    }

    /// Maps constraint violations to their domain meaning.
    pub fn from_database(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some("23505") => return Self::Conflict(db_err.message().to_string()),
                Some("23514") => {
                    return Self::ValidationError(ValidationError::constraint(
                        db_err.message().to_string(),
                    ))
                }
                _ => {}
            }
        }
        Self::DatabaseError(err)
    }
}
