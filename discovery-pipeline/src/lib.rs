//! # Discovery Pipeline
//!
//! Keeps the catalog in step with its upstream sources and the search index
//! in step with the catalog.
//!
//! - [`RefreshOrchestrator`] runs the loaders of a partner in dependency
//!   order and returns per-kind counts.
//! - [`prune`] removes rows a source no longer lists, guarded by a maximum
//!   delete ratio.
//! - [`indexing`] projects catalog rows onto search documents, rebuilds the
//!   index behind its alias and indexes committed changes as they happen.

pub mod errors;
pub mod indexing;
pub mod loader;
pub mod orchestrator;
pub mod outcome;
pub mod prune;

pub use errors::{LoaderError, OrchestratorError};
pub use indexing::{collect_documents, rebuild_index, Projector, RealtimeIndexer};
pub use loader::{Loader, LoaderContext, RefreshSettings, DEFAULT_WRITE_WORKERS};
pub use orchestrator::{loaders_for, RefreshOrchestrator};
pub use outcome::{KindOutcome, RefreshOutcome, SourceFailure, WriteStatus};
pub use prune::{PruneMode, PrunePolicy, PruneReport, DEFAULT_MAX_DELETE_RATIO};
