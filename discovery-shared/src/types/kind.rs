use serde::{Deserialize, Serialize};
use std::fmt;

/// Every kind of row the catalog store persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Currency,
    LanguageTag,
    LevelType,
    Subject,
    Prerequisite,
    SeatType,
    Mode,
    CourseRunType,
    CourseType,
    Organization,
    Person,
    Course,
    CourseRun,
    Seat,
    CourseEntitlement,
    Program,
    SkillValidationConfiguration,
    Catalog,
}

impl EntityKind {
    /// All kinds in loader dependency order (leaves first).
    pub const ALL: [EntityKind; 18] = [
        EntityKind::Currency,
        EntityKind::LanguageTag,
        EntityKind::LevelType,
        EntityKind::Subject,
        EntityKind::Prerequisite,
        EntityKind::SeatType,
        EntityKind::Mode,
        EntityKind::CourseRunType,
        EntityKind::CourseType,
        EntityKind::Organization,
        EntityKind::Person,
        EntityKind::Course,
        EntityKind::CourseRun,
        EntityKind::Seat,
        EntityKind::CourseEntitlement,
        EntityKind::Program,
        EntityKind::SkillValidationConfiguration,
        EntityKind::Catalog,
    ];

    /// Table holding rows of this kind. The history table is `{table}_history`.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Currency => "currencies",
            EntityKind::LanguageTag => "language_tags",
            EntityKind::LevelType => "level_types",
            EntityKind::Subject => "subjects",
            EntityKind::Prerequisite => "prerequisites",
            EntityKind::SeatType => "seat_types",
            EntityKind::Mode => "modes",
            EntityKind::CourseRunType => "course_run_types",
            EntityKind::CourseType => "course_types",
            EntityKind::Organization => "organizations",
            EntityKind::Person => "people",
            EntityKind::Course => "courses",
            EntityKind::CourseRun => "course_runs",
            EntityKind::Seat => "seats",
            EntityKind::CourseEntitlement => "course_entitlements",
            EntityKind::Program => "programs",
            EntityKind::SkillValidationConfiguration => "skill_validation_configurations",
            EntityKind::Catalog => "catalogs",
        }
    }

    /// Short label used in topic names and log fields.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Currency => "currency",
            EntityKind::LanguageTag => "languagetag",
            EntityKind::LevelType => "leveltype",
            EntityKind::Subject => "subject",
            EntityKind::Prerequisite => "prerequisite",
            EntityKind::SeatType => "seattype",
            EntityKind::Mode => "mode",
            EntityKind::CourseRunType => "courseruntype",
            EntityKind::CourseType => "coursetype",
            EntityKind::Organization => "organization",
            EntityKind::Person => "person",
            EntityKind::Course => "course",
            EntityKind::CourseRun => "courserun",
            EntityKind::Seat => "seat",
            EntityKind::CourseEntitlement => "courseentitlement",
            EntityKind::Program => "program",
            EntityKind::SkillValidationConfiguration => "skillvalidationconfiguration",
            EntityKind::Catalog => "catalog",
        }
    }

    /// Whether the natural key is unique across partners rather than within one.
    ///
    /// Run keys embed the organization code, so `(key, draft)` is unique on its own.
    pub fn key_is_global(&self) -> bool {
        matches!(self, EntityKind::CourseRun)
    }

    /// Whether mutations of this kind append to a history table.
    pub fn has_history(&self) -> bool {
        !matches!(
            self,
            EntityKind::Currency | EntityKind::LanguageTag | EntityKind::Catalog
        )
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.label() == label)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
