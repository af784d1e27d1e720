use serde::{Deserialize, Serialize};

/// Tenant boundary. Every partner-scoped row belongs to exactly one partner.
///
/// Endpoints and credentials live in [`crate::PartnerConfig`]; only the
/// identity is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub id: i64,
    pub short_code: String,
    pub name: String,
}
