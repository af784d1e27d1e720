use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest USD-relative spot rate for one currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub currency_code: String,
    pub rate: f64,
    pub timestamp: DateTime<Utc>,
}
