//! Static country to currency overlay.
//!
//! Countries are ISO 3166-1 alpha-3 codes. Eurozone members all map to `EUR`.

use std::collections::BTreeMap;

use lazy_static::lazy_static;

/// ISO 4217 code and display symbol of a country's currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyInfo {
    pub code: &'static str,
    pub symbol: &'static str,
}

pub const EUR: CurrencyInfo = CurrencyInfo {
    code: "EUR",
    symbol: "€",
};

pub const EUROZONE_COUNTRIES: &[&str] = &[
    "AUT", "BEL", "CYP", "DEU", "ESP", "EST", "FIN", "FRA", "GRC", "HRV", "IRL", "ITA", "LTU",
    "LUX", "LVA", "MLT", "NLD", "PRT", "SVK", "SVN",
];

const COUNTRY_CURRENCIES: &[(&str, &str, &str)] = &[
    ("ARG", "ARS", "$"),
    ("AUS", "AUD", "$"),
    ("BGD", "BDT", "৳"),
    ("BRA", "BRL", "R$"),
    ("CAN", "CAD", "$"),
    ("CHE", "CHF", "CHF"),
    ("CHL", "CLP", "$"),
    ("CHN", "CNY", "¥"),
    ("COL", "COP", "$"),
    ("CZE", "CZK", "Kč"),
    ("DNK", "DKK", "kr"),
    ("EGY", "EGP", "E£"),
    ("GBR", "GBP", "£"),
    ("HKG", "HKD", "$"),
    ("HUN", "HUF", "Ft"),
    ("IDN", "IDR", "Rp"),
    ("IND", "INR", "₹"),
    ("ISR", "ILS", "₪"),
    ("JPN", "JPY", "¥"),
    ("KEN", "KES", "KSh"),
    ("KOR", "KRW", "₩"),
    ("MEX", "MXN", "$"),
    ("MYS", "MYR", "RM"),
    ("NGA", "NGN", "₦"),
    ("NOR", "NOK", "kr"),
    ("NZL", "NZD", "$"),
    ("PAK", "PKR", "₨"),
    ("PER", "PEN", "S/"),
    ("PHL", "PHP", "₱"),
    ("POL", "PLN", "zł"),
    ("ROU", "RON", "lei"),
    ("SAU", "SAR", "﷼"),
    ("SGP", "SGD", "$"),
    ("SWE", "SEK", "kr"),
    ("THA", "THB", "฿"),
    ("TUR", "TRY", "₺"),
    ("TWN", "TWD", "NT$"),
    ("UKR", "UAH", "₴"),
    ("USA", "USD", "$"),
    ("VNM", "VND", "₫"),
    ("ZAF", "ZAR", "R"),
];

lazy_static! {
    /// Every known country, Eurozone members collapsed to EUR.
    pub static ref COUNTRY_CURRENCY_MAP: BTreeMap<&'static str, CurrencyInfo> = {
        let mut map: BTreeMap<&'static str, CurrencyInfo> = COUNTRY_CURRENCIES
            .iter()
            .map(|&(country, code, symbol)| (country, CurrencyInfo { code, symbol }))
            .collect();
        for country in EUROZONE_COUNTRIES {
            map.insert(*country, EUR);
        }
        map
    };
}

pub fn currency_for_country(country: &str) -> Option<CurrencyInfo> {
    COUNTRY_CURRENCY_MAP
        .get(country.to_ascii_uppercase().as_str())
        .copied()
}
