use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{CatalogEntity, EntityKind, Scope};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramStatus {
    #[default]
    Unpublished,
    Active,
    Retired,
    Deleted,
}

impl ProgramStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "unpublished" => Some(ProgramStatus::Unpublished),
            "active" => Some(ProgramStatus::Active),
            "retired" => Some(ProgramStatus::Retired),
            "deleted" => Some(ProgramStatus::Deleted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramStatus::Unpublished => "unpublished",
            ProgramStatus::Active => "active",
            ProgramStatus::Retired => "retired",
            ProgramStatus::Deleted => "deleted",
        }
    }

    /// Statuses under which the marketing slug must be unique within the partner.
    pub fn requires_unique_slug(&self) -> bool {
        matches!(self, ProgramStatus::Active | ProgramStatus::Retired)
    }
}

/// Program type, e.g. `xseries` or `micromasters`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramType {
    pub slug: String,
    pub name: String,
}

/// An ordered collection of courses sold as a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: i64,
    pub uuid: Uuid,
    pub partner_id: i64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub title: String,
    pub subtitle: Option<String>,
    pub status: ProgramStatus,
    pub program_type: Option<ProgramType>,
    /// Ordered.
    pub authoring_organization_ids: Vec<i64>,
    /// Ordered.
    pub credit_backing_organization_ids: Vec<i64>,
    /// Ordered.
    pub course_ids: Vec<i64>,
    /// Subset of the runs of `course_ids`.
    pub excluded_course_run_ids: Vec<i64>,
    pub expected_learning_items: Vec<String>,
    pub corporate_endorsements: Vec<String>,
    pub individual_endorsements: Vec<i64>,
    pub faq: Vec<String>,
    pub job_outlook_items: Vec<String>,
    pub video_url: Option<String>,
    pub overview: Option<String>,
    pub min_hours_effort_per_week: Option<i32>,
    pub max_hours_effort_per_week: Option<i32>,
    pub weeks_to_complete: Option<i32>,
    pub banner_image_url: Option<String>,
    pub card_image_url: Option<String>,
    pub marketing_slug: Option<String>,
    pub order_courses_by_start_date: bool,
}

impl Program {
    pub fn is_type(&self, slug: &str) -> bool {
        self.program_type
            .as_ref()
            .map(|t| t.slug.eq_ignore_ascii_case(slug))
            .unwrap_or(false)
    }
}

impl CatalogEntity for Program {
    const KIND: EntityKind = EntityKind::Program;

    fn id(&self) -> i64 {
        self.id
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn scope(&self) -> Scope {
        Scope::Partner(self.partner_id)
    }

    fn natural_key(&self) -> String {
        self.uuid.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels_parse_back() {
        for status in [
            ProgramStatus::Unpublished,
            ProgramStatus::Active,
            ProgramStatus::Retired,
            ProgramStatus::Deleted,
        ] {
            assert_eq!(ProgramStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ProgramStatus::parse("ACTIVE"), Some(ProgramStatus::Active));
    }
}
