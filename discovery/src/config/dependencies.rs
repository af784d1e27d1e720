//! Dependency initialization and wiring.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use discovery_currency::{ExchangeRateService, OpenExchangeRatesFetcher};
use discovery_events::{create_producer_with_config, ChangeBroadcaster, KafkaPublisher};
use discovery_pipeline::{RealtimeIndexer, RefreshOrchestrator};
use discovery_repository::{CatalogService, PostgresCatalogStore};
use discovery_search_repository::{OpenSearchProvider, SearchIndexService, SearchIndexServiceConfig};
use tokio::time::sleep;
use tracing::{info, warn};

use super::Settings;
use crate::errors::AppError;

/// How to treat an unreachable OpenSearch at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry at the configured interval until the cluster answers.
    Retry,
}

impl ConnectionMode {
    /// Reads `OPENSEARCH_CONNECTION_MODE`: `fail-fast` or `retry`, defaulting to `retry`.
    pub fn from_env() -> Self {
        match env::var("OPENSEARCH_CONNECTION_MODE")
            .unwrap_or_else(|_| "retry".to_string())
            .to_lowercase()
            .as_str()
        {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!("Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Everything a command runs against.
pub struct Dependencies {
    /// Catalog with the realtime indexer and, when enabled, the change
    /// broadcaster registered as post-commit listeners.
    pub catalog: CatalogService,
    pub search: SearchIndexService,
    publisher: Option<Arc<KafkaPublisher>>,
}

impl Dependencies {
    pub async fn new(settings: &Settings) -> Result<Self, AppError> {
        info!(
            opensearch_url = %settings.opensearch_url,
            index_alias = %settings.index_alias,
            connection_mode = ?settings.connection_mode,
            events_enabled = settings.events_enabled,
            "Initializing dependencies"
        );

        let store = Self::connect_store(settings).await?;

        let provider = Self::connect_to_opensearch(
            &settings.opensearch_url,
            settings.connection_mode,
            settings.retry_interval,
        )
        .await?;
        info!("OpenSearch connection established");

        let search = SearchIndexService::with_config(
            Arc::new(provider),
            SearchIndexServiceConfig::new(settings.index_alias.clone())
                .with_retention_limit(settings.index_retention_limit),
        );

        let mut catalog = CatalogService::new(Arc::new(store))
            .with_listener(Arc::new(RealtimeIndexer::new(search.clone())));

        let publisher = if settings.events_enabled {
            let producer = create_producer_with_config(&settings.kafka)?;
            let publisher = Arc::new(KafkaPublisher::new(producer));
            catalog = catalog.with_listener(Arc::new(ChangeBroadcaster::new(publisher.clone())));
            info!(broker = %settings.kafka.broker, "Kafka producer created");
            Some(publisher)
        } else {
            info!("Event broadcasting disabled");
            None
        };

        Ok(Self {
            catalog,
            search,
            publisher,
        })
    }

    /// A catalog with no listeners, for jobs that never touch the index or the bus.
    pub async fn catalog_only(settings: &Settings) -> Result<CatalogService, AppError> {
        Ok(CatalogService::new(Arc::new(Self::connect_store(settings).await?)))
    }

    pub fn orchestrator(&self, settings: &Settings) -> RefreshOrchestrator {
        RefreshOrchestrator::new(self.catalog.clone(), settings.refresh)
    }

    pub fn exchange_rates(settings: &Settings) -> Result<ExchangeRateService, AppError> {
        let fetcher = OpenExchangeRatesFetcher::new(
            settings.openexchangerates_url.clone(),
            settings.openexchangerates_api_key.clone(),
        )?;
        Ok(ExchangeRateService::new(Arc::new(fetcher)))
    }

    /// Flushes pending bus messages.
    pub fn shutdown(&self) {
        if let Some(publisher) = &self.publisher {
            if let Err(e) = publisher.flush(Duration::from_secs(5)) {
                warn!(error = %e, "Failed to flush pending events");
            }
        }
    }

    async fn connect_store(settings: &Settings) -> Result<PostgresCatalogStore, AppError> {
        let store =
            PostgresCatalogStore::connect(&settings.database_url, settings.database_max_connections)
                .await?;
        store.migrate().await?;
        info!("Catalog database ready");
        Ok(store)
    }

    /// Connect to OpenSearch with retry logic based on connection mode.
    async fn connect_to_opensearch(
        url: &str,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<OpenSearchProvider, AppError> {
        loop {
            match Self::try_connect_opensearch(url).await {
                Ok(provider) => return Ok(provider),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(AppError::config(format!(
                            "Failed to connect to OpenSearch: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            opensearch_url = %url,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to OpenSearch, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }

    async fn try_connect_opensearch(url: &str) -> Result<OpenSearchProvider, AppError> {
        let provider = OpenSearchProvider::new(url).await?;
        provider.ping().await?;
        Ok(provider)
    }
}
