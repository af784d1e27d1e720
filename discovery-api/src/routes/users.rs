//! Username replacement for the account retirement worker.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use discovery_repository::{ReplacedUsername, UsernameReplacement};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::app::AppState;
use crate::auth::AuthUser;
use crate::errors::ApiError;

#[derive(Debug, Serialize)]
pub struct ReplacementReport {
    pub successful_replacements: Vec<ReplacedUsername>,
    pub failed_replacements: Vec<UsernameReplacement>,
}

/// Reads `{"username_mappings": [{"old": "new"}, ...]}`.
///
/// Every mapping must be an object with exactly one non-empty string entry.
pub fn parse_mappings(body: &Value) -> Result<Vec<UsernameReplacement>, ApiError> {
    let mappings = body
        .get("username_mappings")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::validation("username_mappings must be a list"))?;

    mappings
        .iter()
        .enumerate()
        .map(|(index, mapping)| {
            let entry = mapping
                .as_object()
                .filter(|m| m.len() == 1)
                .and_then(|m| m.iter().next())
                .ok_or_else(|| {
                    ApiError::validation(format!("username_mappings[{index}] must map one username"))
                })?;
            match entry {
                (current, Value::String(new)) if !current.is_empty() && !new.is_empty() => {
                    Ok(UsernameReplacement {
                        current_username: current.clone(),
                        new_username: new.clone(),
                    })
                }
                _ => Err(ApiError::validation(format!(
                    "username_mappings[{index}] must map a username to a non-empty string"
                ))),
            }
        })
        .collect()
}

/// POST /api/v1/replace_usernames
///
/// Rewrites `history_user` on every history table. Usernames that appear
/// nowhere succeed with zero rows updated.
pub async fn replace_usernames(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ReplacementReport>, ApiError> {
    let worker = state.config.username_replacement_worker.as_deref();
    if worker != Some(user.username.as_str()) {
        return Err(ApiError::forbidden(format!(
            "{} may not replace usernames",
            user.username
        )));
    }

    let Json(body) = body.map_err(|e| ApiError::validation(e.body_text()))?;
    let mappings = parse_mappings(&body)?;

    let mut report = ReplacementReport {
        successful_replacements: Vec::with_capacity(mappings.len()),
        failed_replacements: Vec::new(),
    };
    for mapping in mappings {
        match state.catalog.replace_usernames(std::slice::from_ref(&mapping)).await {
            Ok(replaced) => report.successful_replacements.extend(replaced),
            Err(e) => {
                error!(
                    current = %mapping.current_username,
                    new = %mapping.new_username,
                    error = %e,
                    "Username replacement failed"
                );
                report.failed_replacements.push(mapping);
            }
        }
    }

    info!(
        successful = report.successful_replacements.len(),
        failed = report.failed_replacements.len(),
        "Replaced usernames"
    );
    Ok(Json(report))
}
