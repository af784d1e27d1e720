//! # Discovery Currency
//!
//! Daily-refreshed USD exchange rates. [`ExchangeRateService`] caches the
//! provider's rate table for 24 hours and overlays a static country to
//! currency map on it; Eurozone countries all resolve to EUR.

pub mod countries;
pub mod errors;
pub mod fetcher;
pub mod service;

pub use countries::{currency_for_country, CurrencyInfo, EUROZONE_COUNTRIES};
pub use errors::CurrencyError;
pub use fetcher::{MockRateFetcher, OpenExchangeRatesFetcher, RateFetcher, RatePayload};
pub use service::{CountryCurrency, ExchangeRateService};
