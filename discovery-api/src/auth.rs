//! Bearer JWT authentication.
//!
//! Tokens must carry `exp` and `iat`. Issuer and audience are checked when
//! configured, and expiry is enforced with the configured leeway only. The
//! caller's identity is `preferred_username`, falling back to `sub`.

use std::str::FromStr;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::AppState;
use crate::errors::ApiError;

pub const DEFAULT_JWT_ALGORITHM: &str = "HS256";
pub const DEFAULT_JWT_LEEWAY_SECS: u64 = 0;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Failed to decode token: {0}")]
    DecodingError(String),

    #[error("Failed to encode token: {0}")]
    EncodingError(String),
}

/// Token claims the API reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default)]
    pub administrator: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn username(&self) -> Option<&str> {
        self.preferred_username
            .as_deref()
            .or(self.sub.as_deref())
            .filter(|u| !u.is_empty())
    }
}

/// `JWT_AUTH` settings.
#[derive(Clone)]
pub struct JwtSettings {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub algorithm: String,
    pub leeway_secs: u64,
    /// Shared secret for HMAC algorithms, PEM public key otherwise.
    pub secret_key: String,
}

impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("algorithm", &self.algorithm)
            .field("leeway_secs", &self.leeway_secs)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

impl JwtSettings {
    pub fn hmac(secret_key: impl Into<String>) -> Self {
        Self {
            issuer: None,
            audience: None,
            algorithm: DEFAULT_JWT_ALGORITHM.to_string(),
            leeway_secs: DEFAULT_JWT_LEEWAY_SECS,
            secret_key: secret_key.into(),
        }
    }
}

#[derive(Clone)]
pub struct JwtValidator {
    algorithm: Algorithm,
    decoding_key: DecodingKey,
    encoding_key: Option<EncodingKey>,
    validation: Validation,
}

fn is_hmac(algorithm: Algorithm) -> bool {
    matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

impl JwtValidator {
    pub fn new(settings: &JwtSettings) -> Result<Self, JwtError> {
        let algorithm = Algorithm::from_str(&settings.algorithm)
            .map_err(|_| JwtError::UnsupportedAlgorithm(settings.algorithm.clone()))?;

        let (decoding_key, encoding_key) = if is_hmac(algorithm) {
            if settings.secret_key.is_empty() {
                return Err(JwtError::InvalidKey("secret key is empty".into()));
            }
            let secret = settings.secret_key.as_bytes();
            (DecodingKey::from_secret(secret), Some(EncodingKey::from_secret(secret)))
        } else {
            let pem = settings.secret_key.as_bytes();
            let key = match algorithm {
                Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem),
                Algorithm::EdDSA => DecodingKey::from_ed_pem(pem),
                _ => DecodingKey::from_rsa_pem(pem),
            }
            .map_err(|e| JwtError::InvalidKey(e.to_string()))?;
            (key, None)
        };

        let mut validation = Validation::new(algorithm);
        validation.set_required_spec_claims(&["exp", "iat"]);
        validation.validate_exp = true;
        validation.leeway = settings.leeway_secs;
        if let Some(issuer) = &settings.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &settings.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Self {
            algorithm,
            decoding_key,
            encoding_key,
            validation,
        })
    }

    pub fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                ErrorKind::InvalidToken | ErrorKind::InvalidSignature => JwtError::InvalidToken,
                _ => JwtError::DecodingError(e.to_string()),
            })
    }

    /// Signs claims with the shared secret. Only available for HMAC algorithms.
    pub fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        let key = self
            .encoding_key
            .as_ref()
            .ok_or_else(|| JwtError::InvalidKey("no signing key for asymmetric algorithm".into()))?;
        encode(&Header::new(self.algorithm), claims, key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub username: String,
    pub administrator: bool,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("JWT "))
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))?;

        let claims = state.jwt.validate(token.trim()).map_err(|e| {
            tracing::debug!(error = %e, "Rejected token");
            ApiError::unauthorized("Invalid or expired token")
        })?;

        let username = claims
            .username()
            .ok_or_else(|| ApiError::unauthorized("Token carries no username"))?
            .to_string();

        Ok(AuthUser {
            username,
            administrator: claims.administrator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn claims(exp_offset: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            preferred_username: Some("staff".into()),
            sub: None,
            administrator: false,
            iss: None,
            aud: None,
            exp: now + exp_offset,
            iat: now,
        }
    }

    #[test]
    fn test_valid_token_round_trips_claims() {
        let validator = JwtValidator::new(&JwtSettings::hmac("secret")).unwrap();
        let token = validator.sign(&claims(300)).unwrap();
        let decoded = validator.validate(&token).unwrap();
        assert_eq!(decoded.username(), Some("staff"));
    }

    #[test]
    fn test_expired_token_is_rejected_without_leeway() {
        let validator = JwtValidator::new(&JwtSettings::hmac("secret")).unwrap();
        let token = validator.sign(&claims(-5)).unwrap();
        assert!(matches!(validator.validate(&token), Err(JwtError::TokenExpired)));
    }

    #[test]
    fn test_missing_iat_is_rejected() {
        let validator = JwtValidator::new(&JwtSettings::hmac("secret")).unwrap();
        let body = serde_json::json!({
            "preferred_username": "staff",
            "exp": Utc::now().timestamp() + 300,
        });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &body,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(validator.validate(&token).is_err());
    }

    #[test]
    fn test_wrong_secret_and_issuer_are_rejected() {
        let signer = JwtValidator::new(&JwtSettings::hmac("other")).unwrap();
        let validator = JwtValidator::new(&JwtSettings {
            issuer: Some("https://lms.example.org/oauth2".into()),
            ..JwtSettings::hmac("secret")
        })
        .unwrap();
        assert!(validator.validate(&signer.sign(&claims(300)).unwrap()).is_err());

        let same_secret = JwtValidator::new(&JwtSettings::hmac("secret")).unwrap();
        let mut wrong_issuer = claims(300);
        wrong_issuer.iss = Some("https://elsewhere.example.org".into());
        assert!(validator
            .validate(&same_secret.sign(&wrong_issuer).unwrap())
            .is_err());
    }

    #[test]
    fn test_unknown_algorithm_is_a_configuration_error() {
        let settings = JwtSettings {
            algorithm: "HS999".into(),
            ..JwtSettings::hmac("secret")
        };
        assert!(matches!(
            JwtValidator::new(&settings),
            Err(JwtError::UnsupportedAlgorithm(_))
        ));
    }
}
