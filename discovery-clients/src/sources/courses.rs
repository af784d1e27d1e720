//! Courses API: course runs and the course shells derived from their keys.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use discovery_shared::keys::RunKey;
use discovery_shared::SourceEndpoint;
use serde::Deserialize;

use crate::errors::ClientError;
use crate::http::ApiClient;
use crate::normalize::{decode_records, FetchResult};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MediaImage {
    pub raw: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Media {
    pub image: Option<MediaImage>,
}

/// One run as listed by the courses API.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CourseRunRecord {
    /// Run key, e.g. `course-v1:MITx+0.111x+2T2015`.
    pub id: String,
    pub name: Option<String>,
    pub org: Option<String>,
    pub number: Option<String>,
    pub short_description: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub enrollment_start: Option<DateTime<Utc>>,
    pub enrollment_end: Option<DateTime<Utc>>,
    pub pacing: Option<String>,
    pub mobile_available: Option<bool>,
    pub hidden: Option<bool>,
    pub invitation_only: Option<bool>,
    pub has_ofac_restrictions: Option<bool>,
    pub language: Option<String>,
    pub media: Option<Media>,
}

impl CourseRunRecord {
    /// Key of the course the run belongs to.
    pub fn course_key(&self) -> Option<String> {
        RunKey::parse(&self.id).map(|k| k.course_key())
    }

    pub fn image_url(&self) -> Option<String> {
        self.media
            .as_ref()
            .and_then(|m| m.image.as_ref())
            .and_then(|i| i.raw.clone())
    }
}

#[async_trait]
pub trait CoursesSource: Send + Sync {
    async fn list_course_runs(&self) -> Result<FetchResult<CourseRunRecord>, ClientError>;
}

pub struct CoursesApiClient {
    api: ApiClient,
}

impl CoursesApiClient {
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
impl CoursesSource for CoursesApiClient {
    async fn list_course_runs(&self) -> Result<FetchResult<CourseRunRecord>, ClientError> {
        let raw = self.api.get_all("courses/", &[("include_hidden", "true")]).await?;
        Ok(decode_records(raw, "id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_course_key_from_run_key() {
        let record = CourseRunRecord {
            id: "course-v1:MITx+0.111x+2T2015".into(),
            ..Default::default()
        };
        assert_eq!(record.course_key().as_deref(), Some("MITx+0.111x"));

        let legacy = CourseRunRecord {
            id: "MITx/0.111x/2T2015".into(),
            ..Default::default()
        };
        assert_eq!(legacy.course_key().as_deref(), Some("MITx/0.111x"));

        let junk = CourseRunRecord {
            id: "not-a-key".into(),
            ..Default::default()
        };
        assert!(junk.course_key().is_none());
    }
}
