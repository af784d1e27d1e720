//! Per-partner refresh.
//!
//! [`RefreshOrchestrator::refresh`] runs the loaders of one partner in
//! dependency order: vocabularies, organizations, people, courses and runs,
//! course marketing copy, seats, entitlements, programs. Loaders run one
//! after the other because each reads what the previous ones wrote. Distinct
//! partners may be refreshed concurrently when `parallel_refresh_pipeline`
//! is on.

use std::sync::Arc;

use discovery_clients::SourceSet;
use discovery_repository::CatalogService;
use discovery_shared::PartnerConfig;
use futures::future::join_all;
use tracing::{error, info, instrument, warn};

use crate::errors::{LoaderError, OrchestratorError};
use crate::loader::{
    CourseMarketingLoader, CoursesLoader, EntitlementsLoader, Loader, LoaderContext,
    OrganizationsLoader, PeopleLoader, ProgramsLoader, RefreshSettings, SeatsLoader,
    VocabularyLoader,
};
use crate::outcome::{RefreshOutcome, SourceFailure};

/// Loaders for the configured sources, in the order they must run.
pub fn loaders_for(sources: &SourceSet) -> Vec<Box<dyn Loader>> {
    let mut loaders: Vec<Box<dyn Loader>> = Vec::new();
    if let Some(marketing) = &sources.marketing {
        loaders.push(Box::new(VocabularyLoader::new(marketing.clone())));
    }
    if let Some(organizations) = &sources.organizations {
        loaders.push(Box::new(OrganizationsLoader::new(organizations.clone())));
    }
    if let Some(marketing) = &sources.marketing {
        loaders.push(Box::new(PeopleLoader::new(marketing.clone())));
    }
    if let Some(courses) = &sources.courses {
        loaders.push(Box::new(CoursesLoader::new(courses.clone())));
    }
    if let Some(marketing) = &sources.marketing {
        loaders.push(Box::new(CourseMarketingLoader::new(marketing.clone())));
    }
    if let Some(commerce) = &sources.commerce {
        loaders.push(Box::new(SeatsLoader::new(commerce.clone())));
        loaders.push(Box::new(EntitlementsLoader::new(commerce.clone())));
    }
    if let Some(marketing) = &sources.marketing {
        loaders.push(Box::new(ProgramsLoader::new(marketing.clone())));
    }
    loaders
}

#[derive(Clone)]
pub struct RefreshOrchestrator {
    catalog: CatalogService,
    settings: RefreshSettings,
}

impl RefreshOrchestrator {
    pub fn new(catalog: CatalogService, settings: RefreshSettings) -> Self {
        Self { catalog, settings }
    }

    pub fn settings(&self) -> &RefreshSettings {
        &self.settings
    }

    /// Refreshes one partner from its sources.
    ///
    /// A loader whose listing cannot be fetched is recorded in
    /// `source_failures` and skipped, together with its prune phase; the
    /// loaders after it still run. Only a failing catalog store stops the
    /// refresh.
    #[instrument(skip(self, config, sources), fields(partner = %config.short_code))]
    pub async fn refresh(
        &self,
        config: &PartnerConfig,
        sources: &SourceSet,
    ) -> Result<RefreshOutcome, OrchestratorError> {
        let partner = self
            .catalog
            .ensure_partner(&config.short_code, &config.name)
            .await?;
        let ctx = LoaderContext::new(self.catalog.clone(), partner, self.settings);
        let mut outcome = RefreshOutcome::new(&config.short_code);

        let loaders = loaders_for(sources);
        if loaders.is_empty() {
            warn!("Partner has no configured sources");
        }
        for loader in loaders {
            info!(loader = loader.name(), "Running loader");
            match loader.load(&ctx, &mut outcome).await {
                Ok(()) => {}
                Err(LoaderError::Repository(e)) => {
                    error!(loader = loader.name(), error = %e, "Catalog store failed, aborting refresh");
                    return Err(OrchestratorError::Repository(e));
                }
                Err(e) => {
                    error!(loader = loader.name(), error = %e, "Loader failed, skipping its prune phase");
                    outcome.source_failures.push(SourceFailure {
                        loader: loader.name(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let totals = outcome.totals();
        info!(
            created = totals.created,
            updated = totals.updated,
            unchanged = totals.unchanged,
            deleted = totals.deleted,
            failed = totals.failed,
            source_failures = outcome.source_failures.len(),
            "Refresh complete"
        );
        Ok(outcome)
    }

    /// Refreshes every partner, concurrently when `parallel_refresh_pipeline` is on.
    ///
    /// Results come back in the order of `partners`.
    pub async fn refresh_all(
        &self,
        partners: Vec<(PartnerConfig, SourceSet)>,
    ) -> Vec<Result<RefreshOutcome, OrchestratorError>> {
        if self.settings.flags.parallel_refresh_pipeline {
            let this = Arc::new(self.clone());
            let tasks = partners.into_iter().map(|(config, sources)| {
                let this = this.clone();
                tokio::spawn(async move { this.refresh(&config, &sources).await })
            });
            join_all(tasks)
                .await
                .into_iter()
                .map(|joined| {
                    joined.unwrap_or_else(|e| Err(OrchestratorError::Task(e.to_string())))
                })
                .collect()
        } else {
            let mut results = Vec::with_capacity(partners.len());
            for (config, sources) in &partners {
                results.push(self.refresh(config, sources).await);
            }
            results
        }
    }
}
