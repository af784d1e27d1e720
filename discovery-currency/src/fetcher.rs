//! Rate table fetchers.

use std::collections::BTreeMap;
use std::env;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::CurrencyError;

pub const DEFAULT_RATES_URL: &str = "https://openexchangerates.org/api/latest.json";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(2);

/// USD-based rate table as returned by the FX provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatePayload {
    #[serde(default = "usd")]
    pub base: String,
    /// Seconds since the epoch.
    #[serde(default)]
    pub timestamp: i64,
    pub rates: BTreeMap<String, f64>,
}

fn usd() -> String {
    "USD".to_string()
}

#[async_trait]
pub trait RateFetcher: Send + Sync {
    async fn fetch(&self) -> Result<RatePayload, CurrencyError>;
}

/// Fetches the latest rates from Open Exchange Rates.
pub struct OpenExchangeRatesFetcher {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl OpenExchangeRatesFetcher {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Result<Self, CurrencyError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_FETCH_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Reads `OPENEXCHANGERATES_URL` and `OPENEXCHANGERATES_API_KEY`.
    pub fn from_env() -> Result<Self, CurrencyError> {
        Self::new(
            env::var("OPENEXCHANGERATES_URL").unwrap_or_else(|_| DEFAULT_RATES_URL.to_string()),
            env::var("OPENEXCHANGERATES_API_KEY").ok(),
        )
    }
}

#[async_trait]
impl RateFetcher for OpenExchangeRatesFetcher {
    async fn fetch(&self) -> Result<RatePayload, CurrencyError> {
        let api_key = self.api_key.as_deref().ok_or(CurrencyError::MissingApiKey)?;
        let response = self
            .client
            .get(&self.url)
            .query(&[("app_id", api_key)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(CurrencyError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Serves a fixed payload and counts calls.
#[derive(Default)]
pub struct MockRateFetcher {
    payload: RwLock<Option<RatePayload>>,
    calls: RwLock<usize>,
}

impl MockRateFetcher {
    pub fn new(payload: RatePayload) -> Self {
        Self {
            payload: RwLock::new(Some(payload)),
            calls: RwLock::new(0),
        }
    }

    /// Later fetches fail with a 503 until a payload is set again.
    pub fn fail(&self) {
        *self.payload.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn set_payload(&self, payload: RatePayload) {
        *self.payload.write().unwrap_or_else(PoisonError::into_inner) = Some(payload);
    }

    pub fn calls(&self) -> usize {
        *self.calls.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RateFetcher for MockRateFetcher {
    async fn fetch(&self) -> Result<RatePayload, CurrencyError> {
        *self.calls.write().unwrap_or_else(PoisonError::into_inner) += 1;
        self.payload
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| CurrencyError::Status {
                status: 503,
                body: "unavailable".to_string(),
            })
    }
}
