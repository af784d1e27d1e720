//! Entity to payload projections.

use chrono::{DateTime, SecondsFormat, Utc};
use discovery_shared::{
    Course, CourseRun, Organization, Program, ProgramStatus, RunStatus,
};

use crate::pb::{
    CourseChanged, CourseRunChanged, OrganizationChanged, OrganizationRef, ProgramChanged,
    ProgramRun,
};

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|v| v.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

pub fn organization_ref(organization: &Organization) -> OrganizationRef {
    OrganizationRef {
        uuid: organization.uuid.to_string(),
        key: organization.key.clone(),
        name: organization.name.clone().unwrap_or_default(),
    }
}

pub fn course_changed(course: &Course, partner: &str, organizations: &[Organization]) -> CourseChanged {
    CourseChanged {
        uuid: course.uuid.to_string(),
        key: course.key.clone(),
        title: course.title.clone().unwrap_or_default(),
        partner: partner.to_string(),
        url_slug: course.url_slug.clone().unwrap_or_default(),
        authoring_organizations: organizations.iter().map(organization_ref).collect(),
        card_image_url: course.card_image_url.clone().unwrap_or_default(),
    }
}

/// `course` is the run's parent; its title stands in when the run has no override.
pub fn course_run_changed(run: &CourseRun, course: Option<&Course>, partner: &str) -> CourseRunChanged {
    let title = run
        .title_override
        .clone()
        .or_else(|| course.and_then(|c| c.title.clone()))
        .unwrap_or_default();
    CourseRunChanged {
        uuid: run.uuid.to_string(),
        key: run.key.clone(),
        course_uuid: course.map(|c| c.uuid.to_string()).unwrap_or_default(),
        course_key: course.map(|c| c.key.clone()).unwrap_or_default(),
        title,
        partner: partner.to_string(),
        start: timestamp(run.start),
        end: timestamp(run.end),
        pacing_type: run
            .pacing_type
            .map(|p| p.as_str().to_string())
            .unwrap_or_default(),
        status: match run.status {
            RunStatus::Published => "published",
            RunStatus::Unpublished => "unpublished",
        }
        .to_string(),
        hidden: run.hidden,
    }
}

pub fn organization_changed(organization: &Organization, partner: &str) -> OrganizationChanged {
    OrganizationChanged {
        uuid: organization.uuid.to_string(),
        key: organization.key.clone(),
        name: organization.name.clone().unwrap_or_default(),
        partner: partner.to_string(),
        logo_image_url: organization.logo_image_url.clone().unwrap_or_default(),
    }
}

pub fn program_status_label(status: ProgramStatus) -> &'static str {
    match status {
        ProgramStatus::Unpublished => "unpublished",
        ProgramStatus::Active => "active",
        ProgramStatus::Retired => "retired",
        ProgramStatus::Deleted => "deleted",
    }
}

/// `runs` must already exclude the program's excluded runs; each pairs a run
/// with its course uuid.
pub fn program_changed(
    program: &Program,
    partner: &str,
    courses: &[Course],
    runs: &[(CourseRun, String)],
    organizations: &[Organization],
) -> ProgramChanged {
    ProgramChanged {
        uuid: program.uuid.to_string(),
        title: program.title.clone(),
        status: program_status_label(program.status).to_string(),
        program_type: program
            .program_type
            .as_ref()
            .map(|t| t.slug.clone())
            .unwrap_or_default(),
        partner: partner.to_string(),
        marketing_slug: program.marketing_slug.clone().unwrap_or_default(),
        course_uuids: courses.iter().map(|c| c.uuid.to_string()).collect(),
        runs: runs
            .iter()
            .map(|(run, course_uuid)| ProgramRun {
                uuid: run.uuid.to_string(),
                key: run.key.clone(),
                course_uuid: course_uuid.clone(),
            })
            .collect(),
        authoring_organizations: organizations.iter().map(organization_ref).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use discovery_shared::PacingType;
    use uuid::Uuid;

    #[test]
    fn test_run_title_falls_back_to_course() {
        let course = Course {
            uuid: Uuid::new_v4(),
            key: "MITx+0.111x".into(),
            title: Some("Signals".into()),
            ..Default::default()
        };
        let run = CourseRun {
            uuid: Uuid::new_v4(),
            key: "course-v1:MITx+0.111x+2T2015".into(),
            start: Some(Utc.with_ymd_and_hms(2015, 9, 1, 0, 0, 0).unwrap()),
            pacing_type: Some(PacingType::SelfPaced),
            ..Default::default()
        };

        let payload = course_run_changed(&run, Some(&course), "edx");
        assert_eq!(payload.title, "Signals");
        assert_eq!(payload.course_key, "MITx+0.111x");
        assert_eq!(payload.start, "2015-09-01T00:00:00Z");
        assert_eq!(payload.end, "");
        assert_eq!(payload.pacing_type, "self_paced");
        assert_eq!(payload.status, "unpublished");
    }

    #[test]
    fn test_organization_label_fields() {
        let org = Organization {
            key: "MITx".into(),
            name: Some("MIT".into()),
            ..Default::default()
        };
        let payload = organization_changed(&org, "edx");
        assert_eq!(payload.key, "MITx");
        assert_eq!(payload.name, "MIT");
    }
}
