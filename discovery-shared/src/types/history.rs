//! Append-only change log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::EntityKind;

/// Change reason recorded by the loader.
pub const REFRESH_CHANGE_REASON: &str = "refresh_course_metadata";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryType {
    #[serde(rename = "+")]
    Created,
    #[serde(rename = "~")]
    Changed,
    #[serde(rename = "-")]
    Deleted,
}

impl HistoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryType::Created => "+",
            HistoryType::Changed => "~",
            HistoryType::Deleted => "-",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "+" => Some(HistoryType::Created),
            "~" => Some(HistoryType::Changed),
            "-" => Some(HistoryType::Deleted),
            _ => None,
        }
    }
}

/// One revision of one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub history_id: i64,
    pub kind: EntityKind,
    pub entity_id: i64,
    pub history_type: HistoryType,
    pub history_date: DateTime<Utc>,
    pub history_user: Option<String>,
    pub change_reason: Option<String>,
    /// Full row as it was after the change (before it, for deletes).
    pub snapshot: Value,
}

/// Who is writing, why, and how the write should be recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeContext {
    pub user: Option<String>,
    pub reason: Option<String>,
    /// Repeating a write with the same key returns the stored row unchanged.
    pub idempotency_key: Option<String>,
    /// Advisory: honored by the repository write path only.
    pub skip_history: bool,
}

impl ChangeContext {
    /// Context used by the refresh loaders.
    pub fn refresh() -> Self {
        Self {
            reason: Some(REFRESH_CHANGE_REASON.to_string()),
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn skipping_history(mut self) -> Self {
        self.skip_history = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_type_serializes_as_symbol() {
        assert_eq!(
            serde_json::to_string(&HistoryType::Created).unwrap(),
            "\"+\""
        );
        assert_eq!(HistoryType::parse("~"), Some(HistoryType::Changed));
        assert_eq!(HistoryType::parse("x"), None);
    }

    #[test]
    fn test_refresh_context() {
        let ctx = ChangeContext::refresh();
        assert_eq!(ctx.reason.as_deref(), Some(REFRESH_CHANGE_REASON));
        assert!(!ctx.skip_history);
    }
}
