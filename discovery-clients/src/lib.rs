//! # Discovery Clients
//!
//! Readers for the upstream systems a partner's catalog is assembled from:
//! the courses API, the commerce API, the marketing CMS and the
//! organizations API. Every reader authenticates with the partner's
//! credentials, walks `next` links until the listing is exhausted, retries
//! transient failures with exponential backoff and returns records whose
//! strings are trimmed and whose empty strings are missing.
//!
//! ## Usage with SourceSet
//!
//! ```ignore
//! use discovery_clients::SourceSet;
//!
//! // Production: one live client per configured endpoint
//! let sources = SourceSet::live(&partner_config)?;
//!
//! // Tests: every source served from memory
//! let mock = Arc::new(MockSources::new());
//! let sources = SourceSet::mock(mock.clone());
//! ```

pub mod auth;
pub mod errors;
pub mod http;
pub mod mock;
pub mod normalize;
pub mod retry;
pub mod sources;

use std::sync::Arc;

use discovery_shared::PartnerConfig;

pub use auth::Authenticator;
pub use errors::ClientError;
pub use http::{ApiClient, DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT};
pub use mock::MockSources;
pub use normalize::{decode_records, normalize_value, FetchResult, Rejection};
pub use retry::RetryPolicy;
pub use sources::*;

/// The upstream readers of one partner. Unconfigured sources are `None` and
/// their loaders are skipped.
#[derive(Clone, Default)]
pub struct SourceSet {
    pub courses: Option<Arc<dyn CoursesSource>>,
    pub commerce: Option<Arc<dyn CommerceSource>>,
    pub marketing: Option<Arc<dyn MarketingSource>>,
    pub organizations: Option<Arc<dyn OrganizationsSource>>,
}

impl SourceSet {
    /// Builds live clients for every endpoint the partner configures.
    pub fn live(config: &PartnerConfig) -> Result<Self, ClientError> {
        let mut set = SourceSet::default();
        if let Some(endpoint) = &config.courses_api {
            set.courses = Some(Arc::new(CoursesApiClient::new(endpoint)?));
        }
        if let Some(endpoint) = &config.ecommerce_api {
            set.commerce = Some(Arc::new(CommerceApiClient::new(endpoint)?));
        }
        if let Some(endpoint) = &config.marketing_site {
            set.marketing = Some(Arc::new(MarketingApiClient::new(endpoint)?));
        }
        if let Some(endpoint) = &config.organizations_api {
            set.organizations = Some(Arc::new(OrganizationsApiClient::new(endpoint)?));
        }
        Ok(set)
    }

    /// Serves every source from the same mock.
    pub fn mock(mock: Arc<MockSources>) -> Self {
        Self {
            courses: Some(mock.clone()),
            commerce: Some(mock.clone()),
            marketing: Some(mock.clone()),
            organizations: Some(mock),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_shared::{SourceAuth, SourceEndpoint};

    #[test]
    fn test_live_only_builds_configured_sources() {
        let config = PartnerConfig {
            short_code: "edx".into(),
            name: "edX".into(),
            courses_api: Some(SourceEndpoint {
                url: "https://courses.example.org/api/v1/".into(),
                auth: SourceAuth::Bearer {
                    token: "secret".into(),
                },
            }),
            ecommerce_api: None,
            marketing_site: None,
            organizations_api: None,
        };

        let set = SourceSet::live(&config).unwrap();
        assert!(set.courses.is_some());
        assert!(set.commerce.is_none());
        assert!(set.marketing.is_none());
        assert!(set.organizations.is_none());
    }
}
