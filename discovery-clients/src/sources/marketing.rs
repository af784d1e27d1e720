//! Marketing CMS: vocabularies, people, course marketing copy and programs.
//!
//! The marketing site is also the one upstream the pipeline writes back to:
//! when program publication is enabled, saved programs are pushed with
//! [`MarketingSource::publish_program`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use discovery_shared::SourceEndpoint;

use crate::errors::ClientError;
use crate::http::ApiClient;
use crate::normalize::{decode_records, FetchResult};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubjectRecord {
    pub slug: Option<String>,
    pub name: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub banner_image_url: Option<String>,
    pub card_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LevelTypeRecord {
    pub name: String,
    #[serde(default)]
    pub sort_value: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PrerequisiteRecord {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LanguageRecord {
    pub code: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PositionRecord {
    pub title: Option<String>,
    /// Organization key, resolved by the loader.
    pub organization: Option<String>,
    pub organization_override: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SocialNetworkRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PersonRecord {
    pub uuid: Uuid,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub bio: Option<String>,
    pub profile_image_url: Option<String>,
    pub position: Option<PositionRecord>,
    #[serde(default)]
    pub social_networks: Vec<SocialNetworkRecord>,
    #[serde(default)]
    pub areas_of_expertise: Vec<String>,
}

/// Marketing copy for a course, keyed by course key.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MarketingCourseRecord {
    pub key: String,
    pub title: Option<String>,
    pub short_description: Option<String>,
    pub full_description: Option<String>,
    pub level_type: Option<String>,
    /// Subject slugs in display order.
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub expected_learning_items: Vec<String>,
    #[serde(default)]
    pub sponsors: Vec<String>,
    pub card_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProgramRecord {
    pub uuid: Uuid,
    pub title: String,
    pub subtitle: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub program_type: Option<String>,
    pub type_name: Option<String>,
    pub marketing_slug: Option<String>,
    pub overview: Option<String>,
    pub video_url: Option<String>,
    pub banner_image_url: Option<String>,
    pub card_image_url: Option<String>,
    pub min_hours_effort_per_week: Option<i32>,
    pub max_hours_effort_per_week: Option<i32>,
    pub weeks_to_complete: Option<i32>,
    /// Member course keys in program order.
    #[serde(default)]
    pub courses: Vec<String>,
    #[serde(default)]
    pub excluded_course_runs: Vec<String>,
    #[serde(default)]
    pub authoring_organizations: Vec<String>,
    #[serde(default)]
    pub credit_backing_organizations: Vec<String>,
    #[serde(default)]
    pub expected_learning_items: Vec<String>,
    #[serde(default)]
    pub faq: Vec<String>,
    #[serde(default)]
    pub job_outlook_items: Vec<String>,
    #[serde(default)]
    pub order_courses_by_start_date: Option<bool>,
}

/// Program payload pushed back to the marketing site.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramPublication {
    pub uuid: Uuid,
    pub title: String,
    pub subtitle: Option<String>,
    pub status: String,
    #[serde(rename = "type")]
    pub program_type: Option<String>,
    pub marketing_slug: Option<String>,
}

#[async_trait]
pub trait MarketingSource: Send + Sync {
    async fn list_subjects(&self) -> Result<FetchResult<SubjectRecord>, ClientError>;

    async fn list_level_types(&self) -> Result<FetchResult<LevelTypeRecord>, ClientError>;

    async fn list_prerequisites(&self) -> Result<FetchResult<PrerequisiteRecord>, ClientError>;

    async fn list_languages(&self) -> Result<FetchResult<LanguageRecord>, ClientError>;

    async fn list_people(&self) -> Result<FetchResult<PersonRecord>, ClientError>;

    async fn list_courses(&self) -> Result<FetchResult<MarketingCourseRecord>, ClientError>;

    async fn list_programs(&self) -> Result<FetchResult<ProgramRecord>, ClientError>;

    async fn publish_program(&self, program: &ProgramPublication) -> Result<(), ClientError>;
}

pub struct MarketingApiClient {
    api: ApiClient,
}

impl MarketingApiClient {
    pub fn new(endpoint: &SourceEndpoint) -> Result<Self, ClientError> {
        Ok(Self {
            api: ApiClient::new(endpoint)?,
        })
    }

    pub fn from_api(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl MarketingSource for MarketingApiClient {
    async fn list_subjects(&self) -> Result<FetchResult<SubjectRecord>, ClientError> {
        let raw = self.api.get_all("taxonomy/subjects/", &[]).await?;
        Ok(decode_records(raw, "name"))
    }

    async fn list_level_types(&self) -> Result<FetchResult<LevelTypeRecord>, ClientError> {
        let raw = self.api.get_all("taxonomy/level-types/", &[]).await?;
        Ok(decode_records(raw, "name"))
    }

    async fn list_prerequisites(&self) -> Result<FetchResult<PrerequisiteRecord>, ClientError> {
        let raw = self.api.get_all("taxonomy/prerequisites/", &[]).await?;
        Ok(decode_records(raw, "name"))
    }

    async fn list_languages(&self) -> Result<FetchResult<LanguageRecord>, ClientError> {
        let raw = self.api.get_all("taxonomy/languages/", &[]).await?;
        Ok(decode_records(raw, "code"))
    }

    async fn list_people(&self) -> Result<FetchResult<PersonRecord>, ClientError> {
        let raw = self.api.get_all("people/", &[]).await?;
        Ok(decode_records(raw, "uuid"))
    }

    async fn list_courses(&self) -> Result<FetchResult<MarketingCourseRecord>, ClientError> {
        let raw = self.api.get_all("courses/", &[]).await?;
        Ok(decode_records(raw, "key"))
    }

    async fn list_programs(&self) -> Result<FetchResult<ProgramRecord>, ClientError> {
        let raw = self.api.get_all("programs/", &[]).await?;
        Ok(decode_records(raw, "uuid"))
    }

    async fn publish_program(&self, program: &ProgramPublication) -> Result<(), ClientError> {
        let url = self.api.url(&format!("programs/{}/", program.uuid));
        self.api.post_json(&url, program).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_value;
    use serde_json::json;

    #[test]
    fn test_program_record_defaults() {
        let raw = normalize_value(json!({
            "uuid": "5a2b7c56-7a0f-4a33-8f0b-3a7a1f3b2c10",
            "title": " Data Science ",
            "type": "micromasters",
            "marketing_slug": "",
            "courses": ["MITx+6.00.1x", "MITx+6.00.2x"]
        }));
        let program: ProgramRecord = serde_json::from_value(raw).unwrap();

        assert_eq!(program.title, "Data Science");
        assert_eq!(program.program_type.as_deref(), Some("micromasters"));
        assert!(program.marketing_slug.is_none());
        assert_eq!(program.courses.len(), 2);
        assert!(program.excluded_course_runs.is_empty());
    }

    #[test]
    fn test_person_position() {
        let raw = normalize_value(json!({
            "uuid": "0e1f1e54-3b2c-4a40-8c3c-7bd5b5c1b0a1",
            "given_name": "Anant",
            "family_name": "Agarwal",
            "position": {"title": "CEO", "organization": "edX", "organization_override": ""},
            "social_networks": [{"type": "twitter", "url": "https://twitter.com/agarwaledu"}]
        }));
        let person: PersonRecord = serde_json::from_value(raw).unwrap();
        let position = person.position.unwrap();

        assert_eq!(position.organization.as_deref(), Some("edX"));
        assert!(position.organization_override.is_none());
        assert_eq!(person.social_networks[0].kind, "twitter");
    }
}
