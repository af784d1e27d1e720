//! Organizations API.

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use discovery_shared::SourceEndpoint;

use crate::errors::ClientError;
use crate::http::ApiClient;
use crate::normalize::{decode_records, FetchResult};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OrganizationRecord {
    #[serde(alias = "short_name")]
    pub key: String,
    pub uuid: Option<Uuid>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub description_es: Option<String>,
    pub homepage_url: Option<String>,
    #[serde(alias = "logo")]
    pub logo_image_url: Option<String>,
    pub banner_image_url: Option<String>,
    pub certificate_logo_image_url: Option<String>,
    pub marketing_url_path: Option<String>,
    pub organization_hex_color: Option<String>,
}

#[async_trait]
pub trait OrganizationsSource: Send + Sync {
    async fn list_organizations(&self) -> Result<FetchResult<OrganizationRecord>, ClientError>;
}

pub struct OrganizationsApiClient {
    api: ApiClient,
}

impl OrganizationsApiClient {
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
impl OrganizationsSource for OrganizationsApiClient {
    async fn list_organizations(&self) -> Result<FetchResult<OrganizationRecord>, ClientError> {
        let raw = self.api.get_all("organizations/", &[]).await?;
        Ok(decode_records(raw, "short_name"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_value;
    use serde_json::json;

    #[test]
    fn test_short_name_is_key() {
        let raw = normalize_value(json!({
            "short_name": "MITx",
            "name": "Massachusetts Institute of Technology",
            "logo": " https://example.com/mit.png ",
            "description": ""
        }));
        let org: OrganizationRecord = serde_json::from_value(raw).unwrap();

        assert_eq!(org.key, "MITx");
        assert_eq!(org.logo_image_url.as_deref(), Some("https://example.com/mit.png"));
        assert!(org.description.is_none());
    }
}
