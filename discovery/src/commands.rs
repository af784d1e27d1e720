//! One function per subcommand.

use std::sync::Arc;

use discovery_api::{create_app, ApiConfig, AppState, JwtValidator};
use discovery_clients::SourceSet;
use discovery_pipeline::rebuild_index;
use discovery_search_shared::BoostConfig;
use discovery_shared::{EntityKind, PartnerConfig, PartnersFile};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::{Dependencies, Settings};
use crate::errors::AppError;

/// Picks the partners to refresh. An empty filter selects all of them.
pub fn select_partners(
    file: &PartnersFile,
    filter: &[String],
) -> Result<Vec<PartnerConfig>, AppError> {
    if filter.is_empty() {
        return Ok(file.partners.clone());
    }
    filter
        .iter()
        .map(|code| {
            file.get(code)
                .cloned()
                .ok_or_else(|| AppError::config(format!("Unknown partner '{}'", code)))
        })
        .collect()
}

/// Resolves `--kind` to the kinds to dedupe. Kinds without history are rejected.
pub fn history_kinds(kind: Option<&str>) -> Result<Vec<EntityKind>, AppError> {
    match kind {
        None => Ok(EntityKind::ALL
            .iter()
            .copied()
            .filter(EntityKind::has_history)
            .collect()),
        Some(label) => match EntityKind::from_label(label) {
            Some(kind) if kind.has_history() => Ok(vec![kind]),
            Some(_) => Err(AppError::config(format!("'{}' keeps no history", label))),
            None => Err(AppError::config(format!("Unknown record kind '{}'", label))),
        },
    }
}

pub async fn run_refresh(settings: &Settings, partners: &[String]) -> Result<(), AppError> {
    let selected = select_partners(&settings.load_partners()?, partners)?;
    if selected.is_empty() {
        warn!(path = %settings.partners_config.display(), "No partners configured");
        return Ok(());
    }

    let mut work = Vec::with_capacity(selected.len());
    for config in selected {
        let sources = SourceSet::live(&config)?;
        work.push((config, sources));
    }

    let deps = Dependencies::new(settings).await?;
    let results = deps.orchestrator(settings).refresh_all(work).await;
    deps.shutdown();

    let mut failed = Vec::new();
    for result in results {
        match result {
            Ok(outcome) => {
                let totals = outcome.totals();
                if outcome.is_clean() {
                    info!(partner = %outcome.partner, %totals, "Partner refreshed");
                } else {
                    warn!(
                        partner = %outcome.partner,
                        %totals,
                        source_failures = outcome.source_failures.len(),
                        prune_aborted = ?outcome.prune_aborted,
                        "Partner refreshed with problems"
                    );
                }
            }
            Err(e) => {
                error!(error = %e, "Partner refresh failed");
                failed.push(e.to_string());
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(AppError::task_failed(format!(
            "{} partner refresh(es) failed: {}",
            failed.len(),
            failed.join("; ")
        )))
    }
}

/// Rebuilds the index, then drops the indices beyond the retention limit.
pub async fn run_rebuild_index(settings: &Settings) -> Result<(), AppError> {
    let deps = Dependencies::new(settings).await?;
    let outcome = rebuild_index(&deps.catalog, &deps.search).await?;
    info!(
        index = %outcome.index,
        previous = ?outcome.previous,
        indexed = outcome.indexed,
        failed = outcome.failed,
        "Search index rebuilt"
    );

    let pruned = deps.search.prune_indices(None).await?;
    info!(pruned = ?pruned, "Old indices pruned");
    deps.shutdown();
    Ok(())
}

pub async fn run_prune_indices(settings: &Settings, retention: Option<usize>) -> Result<(), AppError> {
    let deps = Dependencies::new(settings).await?;
    let pruned = deps.search.prune_indices(retention).await?;
    info!(
        retention = retention.unwrap_or(settings.index_retention_limit),
        pruned = ?pruned,
        "Old indices pruned"
    );
    Ok(())
}

pub async fn run_dedupe_history(settings: &Settings, kind: Option<&str>) -> Result<(), AppError> {
    let kinds = history_kinds(kind)?;
    let catalog = Dependencies::catalog_only(settings).await?;

    let mut total = 0;
    for kind in kinds {
        let removed = catalog.dedupe_history(kind).await?;
        if removed > 0 {
            info!(kind = %kind, removed, "Removed duplicate history rows");
        }
        total += removed;
    }
    info!(removed = total, "History deduplicated");
    Ok(())
}

pub async fn run_serve(settings: &Settings, bind: Option<String>) -> Result<(), AppError> {
    let jwt = JwtValidator::new(&settings.jwt)?;
    let rates = Dependencies::exchange_rates(settings)?;
    let deps = Dependencies::new(settings).await?;

    let state = AppState {
        catalog: deps.catalog.clone(),
        search: deps.search.clone(),
        rates: Arc::new(rates),
        jwt: Arc::new(jwt),
        config: Arc::new(ApiConfig {
            username_replacement_worker: settings.username_replacement_worker.clone(),
            boost: Some(BoostConfig::default()),
            ..ApiConfig::default()
        }),
    };

    let addr = bind.unwrap_or_else(|| settings.api_bind_addr.clone());
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "API listening");

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API stopped");
    deps.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARTNERS: &str = r#"
[[partners]]
short_code = "edx"
name = "edX"

[[partners]]
short_code = "mitx"
name = "MITx"
"#;

    #[test]
    fn test_select_partners() {
        let file = PartnersFile::parse(PARTNERS).unwrap();

        let all = select_partners(&file, &[]).unwrap();
        assert_eq!(all.len(), 2);

        let one = select_partners(&file, &["mitx".to_string()]).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].name, "MITx");

        assert!(matches!(
            select_partners(&file, &["harvardx".to_string()]),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn test_history_kinds() {
        let all = history_kinds(None).unwrap();
        assert!(all.contains(&EntityKind::CourseRun));
        assert!(!all.contains(&EntityKind::Currency));
        assert!(all.iter().all(EntityKind::has_history));

        assert_eq!(history_kinds(Some("courserun")).unwrap(), vec![EntityKind::CourseRun]);
        assert!(history_kinds(Some("currency")).is_err());
        assert!(history_kinds(Some("widget")).is_err());
    }
}
