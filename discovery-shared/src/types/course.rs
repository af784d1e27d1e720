//! Courses, their scheduled runs, and what learners can buy for them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{CatalogEntity, Draftable, EntityKind, Scope};

/// A logical course offering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub uuid: Uuid,
    pub partner_id: i64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub draft: bool,
    pub key: String,
    pub title: Option<String>,
    pub short_description: Option<String>,
    pub full_description: Option<String>,
    pub level_type_id: Option<i64>,
    pub course_type_id: Option<i64>,
    /// Ordered.
    pub subject_ids: Vec<i64>,
    /// Ordered.
    pub authoring_organization_ids: Vec<i64>,
    /// Ordered.
    pub sponsoring_organization_ids: Vec<i64>,
    pub prerequisite_ids: Vec<i64>,
    /// Ordered.
    pub expected_learning_items: Vec<String>,
    pub card_image_url: Option<String>,
    pub canonical_course_run_id: Option<i64>,
    pub url_slug: Option<String>,
}

impl Draftable for Course {
    fn twin(&self, draft: bool) -> Self {
        Self {
            id: 0,
            draft,
            ..self.clone()
        }
    }
}

impl CatalogEntity for Course {
    const KIND: EntityKind = EntityKind::Course;

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
        self.key.clone()
    }

    fn draft(&self) -> bool {
        self.draft
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingType {
    SelfPaced,
    #[default]
    InstructorPaced,
}

impl PacingType {
    /// Parses the upstream spellings (`self_paced`, `self`, `instructor_paced`, `instructor`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().replace('-', "_").as_str() {
            "self_paced" | "self" => Some(PacingType::SelfPaced),
            "instructor_paced" | "instructor" => Some(PacingType::InstructorPaced),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PacingType::SelfPaced => "self_paced",
            PacingType::InstructorPaced => "instructor_paced",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Published,
    #[default]
    Unpublished,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Published => "published",
            RunStatus::Unpublished => "unpublished",
        }
    }
}

/// Export-control restriction of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfacRestriction {
    Blocked,
    Unrestricted,
    #[default]
    Unknown,
}

impl OfacRestriction {
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => OfacRestriction::Blocked,
            Some(false) => OfacRestriction::Unrestricted,
            None => OfacRestriction::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationLanguage {
    pub code: String,
    pub label: String,
}

/// One scheduled delivery of a [`Course`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseRun {
    pub id: i64,
    pub uuid: Uuid,
    pub partner_id: i64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub draft: bool,
    pub course_id: i64,
    pub key: String,
    pub title_override: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub enrollment_start: Option<DateTime<Utc>>,
    pub enrollment_end: Option<DateTime<Utc>>,
    pub announcement: Option<DateTime<Utc>>,
    pub pacing_type: Option<PacingType>,
    pub min_effort: Option<i32>,
    pub max_effort: Option<i32>,
    pub weeks_to_complete: Option<i32>,
    pub language_id: Option<i64>,
    pub transcript_language_ids: Vec<i64>,
    /// Ordered.
    pub staff_ids: Vec<i64>,
    pub mobile_available: bool,
    pub hidden: bool,
    pub status: RunStatus,
    pub has_ofac_restrictions: OfacRestriction,
    pub invitation_only: bool,
    pub translation_languages: Vec<TranslationLanguage>,
    pub run_type_id: Option<i64>,
    pub card_image_url: Option<String>,
}

impl CourseRun {
    /// A run is live when it has not ended and enrollment is still open.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        let running = self.end.map(|end| end > now).unwrap_or(false);
        let enrollable = self.enrollment_end.map(|end| end > now).unwrap_or(true);
        running && enrollable
    }
}

impl Draftable for CourseRun {
    fn twin(&self, draft: bool) -> Self {
        Self {
            id: 0,
            draft,
            ..self.clone()
        }
    }
}

impl CatalogEntity for CourseRun {
    const KIND: EntityKind = EntityKind::CourseRun;

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
        self.key.clone()
    }

    fn draft(&self) -> bool {
        self.draft
    }
}

/// A purchasable enrollment option attached to a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    pub id: i64,
    pub uuid: Uuid,
    pub partner_id: i64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub draft: bool,
    pub course_run_id: i64,
    pub seat_type_id: i64,
    pub price: Decimal,
    pub currency_id: i64,
    pub upgrade_deadline: Option<DateTime<Utc>>,
    pub credit_provider: Option<String>,
    pub credit_hours: Option<i32>,
    pub sku: Option<String>,
    pub bulk_sku: Option<String>,
}

impl Draftable for Seat {
    fn twin(&self, draft: bool) -> Self {
        Self {
            id: 0,
            draft,
            ..self.clone()
        }
    }
}

impl CatalogEntity for Seat {
    const KIND: EntityKind = EntityKind::Seat;

    fn id(&self) -> i64 {
        self.id
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn scope(&self) -> Scope {
        Scope::Partner(self.partner_id)
    }

    /// `(run, type, currency, credit_provider)`.
    fn natural_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.course_run_id,
            self.seat_type_id,
            self.currency_id,
            self.credit_provider.as_deref().unwrap_or("")
        )
    }

    fn draft(&self) -> bool {
        self.draft
    }
}

/// A run-independent purchasable credential for a course.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseEntitlement {
    pub id: i64,
    pub uuid: Uuid,
    pub partner_id: i64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub draft: bool,
    pub course_id: i64,
    pub mode_id: i64,
    pub price: Decimal,
    pub currency_id: i64,
    pub sku: Option<String>,
    /// Carried through from the commerce product unchanged.
    pub expires: Option<DateTime<Utc>>,
}

impl Draftable for CourseEntitlement {
    fn twin(&self, draft: bool) -> Self {
        Self {
            id: 0,
            draft,
            ..self.clone()
        }
    }
}

impl CatalogEntity for CourseEntitlement {
    const KIND: EntityKind = EntityKind::CourseEntitlement;

    fn id(&self) -> i64 {
        self.id
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn scope(&self) -> Scope {
        Scope::Partner(self.partner_id)
    }

    /// `(course, mode)`.
    fn natural_key(&self) -> String {
        format!("{}:{}", self.course_id, self.mode_id)
    }

    fn draft(&self) -> bool {
        self.draft
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn run_ending(end: Option<DateTime<Utc>>, enrollment_end: Option<DateTime<Utc>>) -> CourseRun {
        CourseRun {
            end,
            enrollment_end,
            ..Default::default()
        }
    }

    #[test]
    fn test_active_with_open_enrollment() {
        let now = Utc::now();
        assert!(run_ending(Some(now + Duration::days(3)), None).is_active_at(now));
    }

    #[test]
    fn test_inactive_after_end() {
        let now = Utc::now();
        assert!(!run_ending(Some(now - Duration::days(1)), None).is_active_at(now));
        assert!(!run_ending(None, None).is_active_at(now));
    }

    #[test]
    fn test_inactive_after_enrollment_closes() {
        let now = Utc::now();
        let run = run_ending(
            Some(now + Duration::days(10)),
            Some(now - Duration::hours(1)),
        );
        assert!(!run.is_active_at(now));
    }

    #[test]
    fn test_seat_natural_key_discriminates_credit_provider() {
        let a = Seat {
            course_run_id: 1,
            seat_type_id: 2,
            currency_id: 3,
            credit_provider: Some("asu".into()),
            ..Default::default()
        };
        let b = Seat {
            credit_provider: Some("mit".into()),
            ..a.clone()
        };
        assert_ne!(a.natural_key(), b.natural_key());
        assert_eq!(a.natural_key(), "1:2:3:asu");
    }

    #[test]
    fn test_pacing_parse() {
        assert_eq!(PacingType::parse("self"), Some(PacingType::SelfPaced));
        assert_eq!(PacingType::parse("Instructor-Paced"), Some(PacingType::InstructorPaced));
        assert_eq!(PacingType::parse("sometimes"), None);
    }
}
