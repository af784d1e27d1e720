//! Discovery entry point.
//!
//! Runs one catalog job per invocation: refresh partners, rebuild or prune
//! the search index, dedupe history, or serve the read API.

use clap::Parser;
use discovery::{commands, AppError, Cli, Command, Settings};
use dotenv::dotenv;
use std::env;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            "discovery=info,discovery_pipeline=info,discovery_repository=info,\
             discovery_search_repository=info,discovery_events=info,discovery_api=info,\
             tower_http=info",
        )
    });

    if env::var("AXIOM_TOKEN").is_ok() {
        // Structured output for log shipping
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .init();

        info!(
            service_name = "discovery",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .init();

        info!(
            service_name = "discovery",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with console output"
        );
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let settings = Settings::from_env()?;

    match cli.command {
        Command::Refresh { partners } => commands::run_refresh(&settings, &partners).await,
        Command::RebuildIndex => commands::run_rebuild_index(&settings).await,
        Command::PruneIndices { retention } => commands::run_prune_indices(&settings, retention).await,
        Command::DedupeHistory { kind } => {
            commands::run_dedupe_history(&settings, kind.as_deref()).await
        }
        Command::Serve { bind } => commands::run_serve(&settings, bind).await,
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();
    init_tracing();

    let command = format!("{:?}", cli.command);
    info!(command = %command, "Starting discovery");

    match run(cli).await {
        Ok(()) => {
            info!(command = %command, "Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!(command = %command, error = %e, "Command failed");
            Err(e)
        }
    }
}
