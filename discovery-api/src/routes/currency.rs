use std::collections::BTreeMap;

use axum::{extract::State, Json};
use discovery_currency::CountryCurrency;

use crate::app::AppState;
use crate::auth::AuthUser;

/// GET /api/v1/currency
///
/// Country to `{code, symbol, rate}`. Empty while no rates are available.
pub async fn get_currency(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Json<BTreeMap<String, CountryCurrency>> {
    Json(state.rates.country_currencies().await)
}
