//! Exchange-rate cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use discovery_shared::ExchangeRate;

use crate::countries::COUNTRY_CURRENCY_MAP;
use crate::errors::CurrencyError;
use crate::fetcher::{RateFetcher, RatePayload};

pub const RATES_CACHE_KEY: &str = "exchange_rates";
pub const DEFAULT_RATES_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A country's currency with its USD rate, as served by the `currency` resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryCurrency {
    pub code: String,
    pub symbol: String,
    pub rate: f64,
}

/// Process-wide rate cache in front of a [`RateFetcher`].
///
/// Racing refreshers may both fetch; the last write wins and readers only
/// ever see a whole payload. Failures and a missing API key yield an empty
/// table and are not cached.
pub struct ExchangeRateService {
    fetcher: Arc<dyn RateFetcher>,
    ttl: Duration,
    cache: RwLock<HashMap<&'static str, (Instant, Arc<RatePayload>)>>,
}

impl ExchangeRateService {
    pub fn new(fetcher: Arc<dyn RateFetcher>) -> Self {
        Self::with_ttl(fetcher, DEFAULT_RATES_TTL)
    }

    pub fn with_ttl(fetcher: Arc<dyn RateFetcher>, ttl: Duration) -> Self {
        Self {
            fetcher,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn cached(&self) -> Option<Arc<RatePayload>> {
        let cache = self.cache.read().await;
        let (stored_at, payload) = cache.get(RATES_CACHE_KEY)?;
        (stored_at.elapsed() < self.ttl).then(|| payload.clone())
    }

    async fn payload(&self) -> Option<Arc<RatePayload>> {
        if let Some(payload) = self.cached().await {
            return Some(payload);
        }

        match self.fetcher.fetch().await {
            Ok(payload) => {
                let payload = Arc::new(payload);
                self.cache
                    .write()
                    .await
                    .insert(RATES_CACHE_KEY, (Instant::now(), payload.clone()));
                debug!(currencies = payload.rates.len(), "Cached exchange rates");
                Some(payload)
            }
            Err(CurrencyError::MissingApiKey) => {
                warn!("No exchange rate API key configured, returning no rates");
                None
            }
            Err(CurrencyError::Status { status, body }) => {
                error!(status, body = %body, "Exchange rate request failed");
                None
            }
            Err(e) => {
                error!(error = %e, "Exchange rate request failed");
                None
            }
        }
    }

    /// `{currency_code -> rate}` relative to USD.
    pub async fn get_rates(&self) -> BTreeMap<String, f64> {
        self.payload()
            .await
            .map(|p| p.rates.clone())
            .unwrap_or_default()
    }

    pub async fn exchange_rates(&self) -> Vec<ExchangeRate> {
        let Some(payload) = self.payload().await else {
            return Vec::new();
        };
        let timestamp = DateTime::<Utc>::from_timestamp(payload.timestamp, 0).unwrap_or_default();
        payload
            .rates
            .iter()
            .map(|(code, rate)| ExchangeRate {
                currency_code: code.clone(),
                rate: *rate,
                timestamp,
            })
            .collect()
    }

    /// `{country -> currency and rate}` for every country whose currency has a rate.
    pub async fn country_currencies(&self) -> BTreeMap<String, CountryCurrency> {
        let rates = self.get_rates().await;
        COUNTRY_CURRENCY_MAP
            .iter()
            .filter_map(|(country, info)| {
                rates.get(info.code).map(|rate| {
                    (
                        country.to_string(),
                        CountryCurrency {
                            code: info.code.to_string(),
                            symbol: info.symbol.to_string(),
                            rate: *rate,
                        },
                    )
                })
            })
            .collect()
    }

    pub async fn invalidate(&self) {
        self.cache.write().await.remove(RATES_CACHE_KEY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::MockRateFetcher;

    fn payload(eur: f64) -> RatePayload {
        RatePayload {
            base: "USD".into(),
            timestamp: 1_700_000_000,
            rates: BTreeMap::from([
                ("EUR".to_string(), eur),
                ("INR".to_string(), 83.1),
                ("USD".to_string(), 1.0),
            ]),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rates_are_cached_for_a_day() {
        let fetcher = Arc::new(MockRateFetcher::new(payload(0.92)));
        let service = ExchangeRateService::new(fetcher.clone());

        let first = service.get_rates().await;
        fetcher.set_payload(payload(0.95));
        tokio::time::advance(Duration::from_secs(23 * 60 * 60)).await;
        let second = service.get_rates().await;
        assert_eq!(first, second);
        assert_eq!(fetcher.calls(), 1);

        tokio::time::advance(Duration::from_secs(2 * 60 * 60)).await;
        assert_eq!(service.get_rates().await["EUR"], 0.95);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_returns_empty_and_is_not_cached() {
        let fetcher = Arc::new(MockRateFetcher::new(payload(0.92)));
        fetcher.fail();
        let service = ExchangeRateService::new(fetcher.clone());

        assert!(service.get_rates().await.is_empty());
        fetcher.set_payload(payload(0.92));
        assert_eq!(service.get_rates().await.len(), 3);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_country_overlay() {
        let service = ExchangeRateService::new(Arc::new(MockRateFetcher::new(payload(0.92))));
        let countries = service.country_currencies().await;

        assert_eq!(countries["FRA"].code, "EUR");
        assert_eq!(countries["FRA"].rate, 0.92);
        assert_eq!(countries["IND"].symbol, "₹");
        // No rate for GBP in the payload.
        assert!(!countries.contains_key("GBR"));
    }

    #[tokio::test]
    async fn test_exchange_rates_carry_timestamp() {
        let service = ExchangeRateService::new(Arc::new(MockRateFetcher::new(payload(0.92))));
        let rates = service.exchange_rates().await;
        assert_eq!(rates.len(), 3);
        assert_eq!(rates[0].currency_code, "EUR");
        assert_eq!(rates[0].timestamp.timestamp(), 1_700_000_000);
    }
}
