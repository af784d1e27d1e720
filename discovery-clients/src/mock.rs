//! In-memory upstream used by pipeline tests and local development.
//!
//! [`MockSources`] implements every source trait over records registered up
//! front. Individual calls can be made to fail with an upstream status, and
//! programs pushed to the marketing site are recorded for inspection.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::errors::ClientError;
use crate::normalize::{FetchResult, Rejection};
use crate::sources::{
    CommerceCourseRecord, CommerceSource, CourseRunRecord, CoursesSource, EntitlementRecord,
    LanguageRecord, LevelTypeRecord, MarketingCourseRecord, MarketingSource, OrganizationRecord,
    OrganizationsSource, PersonRecord, PrerequisiteRecord, ProgramPublication, ProgramRecord,
    SubjectRecord,
};

/// Call names accepted by [`MockSources::fail`] and [`MockSources::reject`].
pub mod calls {
    pub const COURSE_RUNS: &str = "course_runs";
    pub const COMMERCE_COURSES: &str = "commerce_courses";
    pub const ENTITLEMENTS: &str = "entitlements";
    pub const SUBJECTS: &str = "subjects";
    pub const LEVEL_TYPES: &str = "level_types";
    pub const PREREQUISITES: &str = "prerequisites";
    pub const LANGUAGES: &str = "languages";
    pub const PEOPLE: &str = "people";
    pub const MARKETING_COURSES: &str = "marketing_courses";
    pub const PROGRAMS: &str = "programs";
    pub const ORGANIZATIONS: &str = "organizations";
    pub const PUBLISH_PROGRAM: &str = "publish_program";
}

#[derive(Default)]
struct MockState {
    course_runs: Vec<CourseRunRecord>,
    commerce_courses: Vec<CommerceCourseRecord>,
    entitlements: Vec<EntitlementRecord>,
    subjects: Vec<SubjectRecord>,
    level_types: Vec<LevelTypeRecord>,
    prerequisites: Vec<PrerequisiteRecord>,
    languages: Vec<LanguageRecord>,
    people: Vec<PersonRecord>,
    marketing_courses: Vec<MarketingCourseRecord>,
    programs: Vec<ProgramRecord>,
    organizations: Vec<OrganizationRecord>,
    failures: HashMap<&'static str, u16>,
    rejections: HashMap<&'static str, Vec<Rejection>>,
    published: Vec<ProgramPublication>,
    calls: HashMap<&'static str, usize>,
}

/// Mock upstream that serves pre-registered records for every source.
#[derive(Default)]
pub struct MockSources {
    state: RwLock<MockState>,
}

impl MockSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_course_runs(&self, records: Vec<CourseRunRecord>) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).course_runs = records;
    }

    pub fn set_commerce_courses(&self, records: Vec<CommerceCourseRecord>) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).commerce_courses = records;
    }

    pub fn set_entitlements(&self, records: Vec<EntitlementRecord>) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).entitlements = records;
    }

    pub fn set_subjects(&self, records: Vec<SubjectRecord>) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).subjects = records;
    }

    pub fn set_level_types(&self, records: Vec<LevelTypeRecord>) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).level_types = records;
    }

    pub fn set_prerequisites(&self, records: Vec<PrerequisiteRecord>) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).prerequisites = records;
    }

    pub fn set_languages(&self, records: Vec<LanguageRecord>) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).languages = records;
    }

    pub fn set_people(&self, records: Vec<PersonRecord>) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).people = records;
    }

    pub fn set_marketing_courses(&self, records: Vec<MarketingCourseRecord>) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).marketing_courses = records;
    }

    pub fn set_programs(&self, records: Vec<ProgramRecord>) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).programs = records;
    }

    pub fn set_organizations(&self, records: Vec<OrganizationRecord>) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).organizations = records;
    }

    /// Makes every later call named `call` fail with the given upstream status.
    pub fn fail(&self, call: &'static str, status: u16) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).failures.insert(call, status);
    }

    pub fn recover(&self, call: &'static str) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).failures.remove(call);
    }

    /// Reports a record rejection alongside the records of `call`.
    pub fn reject(&self, call: &'static str, key: &str, error: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let rejections = state.rejections.entry(call).or_default();
        let index = rejections.len();
        rejections.push(Rejection {
            index,
            key: Some(key.to_string()),
            error: error.to_string(),
        });
    }

    pub fn published_programs(&self) -> Vec<ProgramPublication> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).published.clone()
    }

    pub fn call_count(&self, call: &'static str) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .calls
            .get(call)
            .copied()
            .unwrap_or(0)
    }

    fn serve<T: Clone>(
        &self,
        call: &'static str,
        select: impl FnOnce(&MockState) -> &Vec<T>,
    ) -> Result<FetchResult<T>, ClientError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state.calls.entry(call).or_default() += 1;
        if let Some(status) = state.failures.get(call) {
            return Err(ClientError::Status {
                status: *status,
                url: format!("mock://{}", call),
                body: String::new(),
            });
        }
        Ok(FetchResult {
            records: select(&state).clone(),
            rejections: state.rejections.get(call).cloned().unwrap_or_default(),
        })
    }
}

#[async_trait]
impl CoursesSource for MockSources {
    async fn list_course_runs(&self) -> Result<FetchResult<CourseRunRecord>, ClientError> {
        self.serve(calls::COURSE_RUNS, |s| &s.course_runs)
    }
}

#[async_trait]
impl CommerceSource for MockSources {
    async fn list_courses(&self) -> Result<FetchResult<CommerceCourseRecord>, ClientError> {
        self.serve(calls::COMMERCE_COURSES, |s| &s.commerce_courses)
    }

    async fn list_entitlements(&self) -> Result<FetchResult<EntitlementRecord>, ClientError> {
        self.serve(calls::ENTITLEMENTS, |s| &s.entitlements)
    }
}

#[async_trait]
impl MarketingSource for MockSources {
    async fn list_subjects(&self) -> Result<FetchResult<SubjectRecord>, ClientError> {
        self.serve(calls::SUBJECTS, |s| &s.subjects)
    }

    async fn list_level_types(&self) -> Result<FetchResult<LevelTypeRecord>, ClientError> {
        self.serve(calls::LEVEL_TYPES, |s| &s.level_types)
    }

    async fn list_prerequisites(&self) -> Result<FetchResult<PrerequisiteRecord>, ClientError> {
        self.serve(calls::PREREQUISITES, |s| &s.prerequisites)
    }

    async fn list_languages(&self) -> Result<FetchResult<LanguageRecord>, ClientError> {
        self.serve(calls::LANGUAGES, |s| &s.languages)
    }

    async fn list_people(&self) -> Result<FetchResult<PersonRecord>, ClientError> {
        self.serve(calls::PEOPLE, |s| &s.people)
    }

    async fn list_courses(&self) -> Result<FetchResult<MarketingCourseRecord>, ClientError> {
        self.serve(calls::MARKETING_COURSES, |s| &s.marketing_courses)
    }

    async fn list_programs(&self) -> Result<FetchResult<ProgramRecord>, ClientError> {
        self.serve(calls::PROGRAMS, |s| &s.programs)
    }

    async fn publish_program(&self, program: &ProgramPublication) -> Result<(), ClientError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state.calls.entry(calls::PUBLISH_PROGRAM).or_default() += 1;
        if let Some(status) = state.failures.get(calls::PUBLISH_PROGRAM) {
            return Err(ClientError::Status {
                status: *status,
                url: format!("mock://{}", calls::PUBLISH_PROGRAM),
                body: String::new(),
            });
        }
        state.published.push(program.clone());
        Ok(())
    }
}

#[async_trait]
impl OrganizationsSource for MockSources {
    async fn list_organizations(&self) -> Result<FetchResult<OrganizationRecord>, ClientError> {
        self.serve(calls::ORGANIZATIONS, |s| &s.organizations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_registered_records() {
        let mock = MockSources::new();
        mock.set_course_runs(vec![CourseRunRecord {
            id: "course-v1:MITx+0.111x+2T2015".into(),
            ..Default::default()
        }]);

        let result = mock.list_course_runs().await.unwrap();
        assert_eq!(result.records.len(), 1);
        assert!(result.rejections.is_empty());
        assert_eq!(mock.call_count(calls::COURSE_RUNS), 1);
    }

    #[tokio::test]
    async fn test_injected_failure_is_transient_for_5xx() {
        let mock = MockSources::new();
        mock.fail(calls::ORGANIZATIONS, 503);

        let err = mock.list_organizations().await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.status(), Some(503));

        mock.recover(calls::ORGANIZATIONS);
        assert!(mock.list_organizations().await.is_ok());
    }

    #[tokio::test]
    async fn test_rejections_are_reported() {
        let mock = MockSources::new();
        mock.reject(calls::PEOPLE, "bad-uuid", "invalid uuid");

        let result = mock.list_people().await.unwrap();
        assert!(result.records.is_empty());
        assert_eq!(result.rejections.len(), 1);
        assert_eq!(result.rejections[0].key.as_deref(), Some("bad-uuid"));
    }
}
