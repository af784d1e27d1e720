//! Classification vocabularies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ValidationError;
use crate::types::{CatalogEntity, EntityKind, Scope};

/// Slug of the legacy type exempt from the track/entitlement invariant.
pub const EMPTY_TYPE_SLUG: &str = "empty";

macro_rules! global_entity {
    ($ty:ty, $kind:expr, $key:ident) => {
        impl CatalogEntity for $ty {
            const KIND: EntityKind = $kind;

            fn id(&self) -> i64 {
                self.id
            }

            fn uuid(&self) -> Uuid {
                self.uuid
            }

            fn scope(&self) -> Scope {
                Scope::Global
            }

            fn natural_key(&self) -> String {
                self.$key.clone()
            }
        }
    };
}

/// ISO-4217 currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub id: i64,
    pub uuid: Uuid,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub code: String,
    pub name: String,
}

global_entity!(Currency, EntityKind::Currency, code);

/// BCP-47 language tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageTag {
    pub id: i64,
    pub uuid: Uuid,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub code: String,
    pub name: String,
}

global_entity!(LanguageTag, EntityKind::LanguageTag, code);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelType {
    pub id: i64,
    pub uuid: Uuid,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub name: String,
    pub sort_value: i32,
}

global_entity!(LevelType, EntityKind::LevelType, name);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeatType {
    pub id: i64,
    pub uuid: Uuid,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub slug: String,
    pub name: String,
}

global_entity!(SeatType, EntityKind::SeatType, slug);

/// Enrollment mode, e.g. `verified` or `audit`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mode {
    pub id: i64,
    pub uuid: Uuid,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub slug: String,
    pub name: String,
    pub is_id_verified: bool,
    pub certificate_type: Option<String>,
}

global_entity!(Mode, EntityKind::Mode, slug);

/// `(Mode, SeatType)`; a seat type is absent for free modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Track {
    pub mode_id: i64,
    pub seat_type_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseRunType {
    pub id: i64,
    pub uuid: Uuid,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub slug: String,
    pub name: String,
    pub tracks: Vec<Track>,
    /// Runs of a non-marketable type never reach the search index.
    pub is_marketable: bool,
}

impl CourseRunType {
    pub fn has_seat_type(&self, seat_type_id: i64) -> bool {
        self.tracks
            .iter()
            .any(|t| t.seat_type_id == Some(seat_type_id))
    }
}

global_entity!(CourseRunType, EntityKind::CourseRunType, slug);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseType {
    pub id: i64,
    pub uuid: Uuid,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub slug: String,
    pub name: String,
    pub course_run_type_ids: Vec<i64>,
    pub entitlement_seat_type_ids: Vec<i64>,
}

impl CourseType {
    /// Every entitlement seat type must appear as a track in one of the run types.
    pub fn validate_entitlement_types(
        &self,
        run_types: &[CourseRunType],
    ) -> Result<(), ValidationError> {
        if self.slug == EMPTY_TYPE_SLUG {
            return Ok(());
        }

        for seat_type_id in &self.entitlement_seat_type_ids {
            let offered = run_types
                .iter()
                .filter(|rt| self.course_run_type_ids.contains(&rt.id))
                .any(|rt| rt.has_seat_type(*seat_type_id));
            if !offered {
                return Err(ValidationError::constraint(format!(
                    "seat type {} is not offered by any run type of course type '{}'",
                    seat_type_id, self.slug
                )));
            }
        }
        Ok(())
    }
}

global_entity!(CourseType, EntityKind::CourseType, slug);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub uuid: Uuid,
    pub partner_id: i64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub slug: String,
    pub name: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub banner_image_url: Option<String>,
    pub card_image_url: Option<String>,
}

impl CatalogEntity for Subject {
    const KIND: EntityKind = EntityKind::Subject;

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
        self.slug.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prerequisite {
    pub id: i64,
    pub uuid: Uuid,
    pub partner_id: i64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub name: String,
}

impl CatalogEntity for Prerequisite {
    const KIND: EntityKind = EntityKind::Prerequisite;

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
        self.name.clone()
    }
}

/// Disables automated skill extraction for exactly one course or organization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillValidationConfiguration {
    pub id: i64,
    pub uuid: Uuid,
    pub partner_id: i64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub course_id: Option<i64>,
    pub organization_id: Option<i64>,
}

impl SkillValidationConfiguration {
    pub fn for_course(partner_id: i64, course_id: i64) -> Self {
        Self {
            partner_id,
            course_id: Some(course_id),
            ..Default::default()
        }
    }

    pub fn for_organization(partner_id: i64, organization_id: i64) -> Self {
        Self {
            partner_id,
            organization_id: Some(organization_id),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match (self.course_id, self.organization_id) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            _ => Err(ValidationError::constraint(
                "skill validation configuration needs exactly one of course or organization",
            )),
        }
    }
}

impl CatalogEntity for SkillValidationConfiguration {
    const KIND: EntityKind = EntityKind::SkillValidationConfiguration;

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
        match (self.course_id, self.organization_id) {
            (Some(course), _) => format!("course:{}", course),
            (None, Some(org)) => format!("organization:{}", org),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_type(id: i64, seat_types: &[i64]) -> CourseRunType {
        CourseRunType {
            id,
            slug: format!("rt-{}", id),
            tracks: seat_types
                .iter()
                .map(|s| Track {
                    mode_id: 1,
                    seat_type_id: Some(*s),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_skill_config_xor() {
        assert!(SkillValidationConfiguration::for_course(1, 2).validate().is_ok());
        assert!(SkillValidationConfiguration::for_organization(1, 2)
            .validate()
            .is_ok());

        let both = SkillValidationConfiguration {
            course_id: Some(1),
            organization_id: Some(2),
            ..Default::default()
        };
        assert!(both.validate().is_err());
        assert!(SkillValidationConfiguration::default().validate().is_err());
    }

    #[test]
    fn test_entitlement_type_must_be_offered_by_a_track() {
        let course_type = CourseType {
            slug: "verified-audit".into(),
            course_run_type_ids: vec![10],
            entitlement_seat_type_ids: vec![5],
            ..Default::default()
        };
        assert!(course_type
            .validate_entitlement_types(&[run_type(10, &[5])])
            .is_ok());
        assert!(course_type
            .validate_entitlement_types(&[run_type(10, &[6])])
            .is_err());
        // Run type offering the seat but not part of the course type does not count.
        assert!(course_type
            .validate_entitlement_types(&[run_type(11, &[5])])
            .is_err());
    }

    #[test]
    fn test_empty_course_type_is_exempt() {
        let course_type = CourseType {
            slug: EMPTY_TYPE_SLUG.into(),
            entitlement_seat_type_ids: vec![5],
            ..Default::default()
        };
        assert!(course_type.validate_entitlement_types(&[]).is_ok());
    }
}
