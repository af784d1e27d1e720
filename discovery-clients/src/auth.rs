//! Per-source request authentication.

use discovery_shared::SourceAuth;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::ClientError;

/// Tokens are refreshed this long before they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    header: String,
    refresh_at: Instant,
}

/// Applies one source's credentials to outgoing requests.
///
/// OAuth2 client-credentials tokens are fetched lazily and cached until
/// shortly before they expire.
pub struct Authenticator {
    auth: SourceAuth,
    cached: Mutex<Option<CachedToken>>,
}

impl Authenticator {
    pub fn new(auth: SourceAuth) -> Self {
        Self {
            auth,
            cached: Mutex::new(None),
        }
    }

    pub async fn apply(&self, http: &Client, request: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        Ok(match &self.auth {
            SourceAuth::None => request,
            SourceAuth::Bearer { token } => request.bearer_auth(token),
            SourceAuth::Basic { username, password } => request.basic_auth(username, Some(password)),
            SourceAuth::Oauth2 { .. } => {
                let header = self.oauth2_header(http).await?;
                request.header(reqwest::header::AUTHORIZATION, header)
            }
        })
    }

    /// Drops a cached token, e.g. after the upstream answered 401.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn oauth2_header(&self, http: &Client) -> Result<String, ClientError> {
        let SourceAuth::Oauth2 {
            token_url,
            client_id,
            client_secret,
        } = &self.auth
        else {
            return Err(ClientError::configuration("source is not configured for OAuth2"));
        };

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.header.clone());
            }
        }

        let response = http
            .post(token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("token_type", "jwt"),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::auth(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await?;
        let scheme = token.token_type.as_deref().unwrap_or("Bearer");
        let header = format!("{} {}", normalize_scheme(scheme), token.access_token);
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        debug!(token_url = %token_url, lifetime_secs = lifetime.as_secs(), "Fetched OAuth2 token");

        *cached = Some(CachedToken {
            header: header.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        });
        Ok(header)
    }
}

fn normalize_scheme(scheme: &str) -> &str {
    if scheme.eq_ignore_ascii_case("jwt") {
        "JWT"
    } else {
        "Bearer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_scheme() {
        assert_eq!(normalize_scheme("jwt"), "JWT");
        assert_eq!(normalize_scheme("bearer"), "Bearer");
        assert_eq!(normalize_scheme("anything"), "Bearer");
    }

    #[tokio::test]
    async fn test_bearer_sets_header() {
        let http = Client::new();
        let auth = Authenticator::new(SourceAuth::Bearer {
            token: "abc".into(),
        });
        let request = auth
            .apply(&http, http.get("http://localhost/api"))
            .await
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.headers().get(reqwest::header::AUTHORIZATION).unwrap(),
            "Bearer abc"
        );
    }
}
