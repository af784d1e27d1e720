//! Partner configuration file.
//!
//! ```toml
//! [[partners]]
//! short_code = "edx"
//! name = "edX"
//!
//! [partners.courses_api]
//! url = "https://courses.example.org/api/courses/v1/"
//! auth = { type = "oauth2", token_url = "https://lms.example.org/oauth2/access_token", client_id = "id", client_secret = "secret" }
//! ```

use serde::Deserialize;
use std::fmt;
use std::path::Path;

use crate::errors::ValidationError;

/// How requests to one upstream source authenticate.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceAuth {
    #[default]
    None,
    Bearer {
        token: String,
    },
    Oauth2 {
        token_url: String,
        client_id: String,
        client_secret: String,
    },
    Basic {
        username: String,
        password: String,
    },
}

impl fmt::Debug for SourceAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceAuth::None => f.write_str("None"),
            SourceAuth::Bearer { .. } => f.debug_struct("Bearer").field("token", &"[REDACTED]").finish(),
            SourceAuth::Oauth2 {
                token_url,
                client_id,
                ..
            } => f
                .debug_struct("Oauth2")
                .field("token_url", token_url)
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .finish(),
            SourceAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceEndpoint {
    pub url: String,
    #[serde(default)]
    pub auth: SourceAuth,
}

/// Endpoints and credentials of one partner.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PartnerConfig {
    pub short_code: String,
    pub name: String,
    pub courses_api: Option<SourceEndpoint>,
    pub ecommerce_api: Option<SourceEndpoint>,
    pub marketing_site: Option<SourceEndpoint>,
    pub organizations_api: Option<SourceEndpoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PartnersFile {
    #[serde(default)]
    pub partners: Vec<PartnerConfig>,
}

impl PartnersFile {
    pub fn parse(contents: &str) -> Result<Self, ValidationError> {
        let file: PartnersFile = toml::from_str(contents)
            .map_err(|e| ValidationError::field("partners", e.to_string()))?;

        let mut codes: Vec<&str> = file.partners.iter().map(|p| p.short_code.as_str()).collect();
        codes.sort_unstable();
        if let Some(pair) = codes.windows(2).find(|w| w[0] == w[1]) {
            return Err(ValidationError::field(
                "partners",
                format!("duplicate partner short code '{}'", pair[0]),
            ));
        }

        Ok(file)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::field("partners", format!("{}: {}", path.display(), e))
        })?;
        Self::parse(&contents)
    }

    pub fn get(&self, short_code: &str) -> Option<&PartnerConfig> {
        self.partners.iter().find(|p| p.short_code == short_code)
    }
}
