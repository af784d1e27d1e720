//! # Discovery Repository
//!
//! Persistence for the canonical catalog. The object-safe [`CatalogStore`]
//! trait abstracts the backend (PostgreSQL in production, an in-memory store in
//! tests); [`Repository`] adds typed access per entity kind; and
//! [`CatalogService`] enforces the cross-entity invariants, cascades, slug
//! history and draft/official lookups, and dispatches post-commit change hooks.

pub mod errors;
pub mod hooks;
pub mod interfaces;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod service;

pub use errors::CatalogRepositoryError;
pub use hooks::{CatalogChange, ChangeDispatcher, ChangeListener, ChangeOp, PostCommitQueue};
pub use interfaces::{CatalogStore, RecordFilter, RecordWrite, StoreOutcome, StoredRecord};
pub use memory::InMemoryCatalogStore;
pub use postgres::PostgresCatalogStore;
pub use repository::{Repository, SaveOutcome};
pub use service::{CatalogService, ReplacedUsername, UsernameReplacement, Vocabulary};
