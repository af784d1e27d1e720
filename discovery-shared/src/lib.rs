//! # Discovery Shared
//!
//! Canonical data model for the course catalog: entity types, classification
//! vocabularies, history records, and the pure helpers every other crate in
//! the workspace builds on (field diffing, slug derivation, course-key
//! parsing, HTML and color validation, feature flags, partner configuration).

pub mod config;
pub mod diff;
pub mod errors;
pub mod flags;
pub mod keys;
pub mod slug;
pub mod types;
pub mod validation;

pub use config::{PartnerConfig, PartnersFile, SourceAuth, SourceEndpoint};
pub use diff::{diff_fields, FieldChange, FieldDiff, FieldMap, DEFAULT_EXCLUDED_FIELDS};
pub use errors::ValidationError;
pub use flags::FeatureFlags;
pub use types::*;
