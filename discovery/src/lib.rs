//! Course catalog discovery service.
//!
//! Wires the catalog store, the partner sources, the search index, the
//! change bus and the read API together behind one binary with a
//! subcommand per job.

pub mod cli;
pub mod commands;
pub mod config;
pub mod errors;

pub use cli::{Cli, Command};
pub use config::{ConnectionMode, Dependencies, Settings};
pub use errors::AppError;
