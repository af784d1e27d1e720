//! Error types for the catalog repository.

mod catalog_repository_error;

pub use catalog_repository_error::CatalogRepositoryError;
