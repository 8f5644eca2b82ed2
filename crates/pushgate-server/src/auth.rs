//! Caller authentication.
//!
//! Bearer tokens issued by the external identity provider are verified with
//! a statically configured key. Verification only decides whether a caller
//! is present; a missing or invalid token yields no identity, and the
//! dispatcher reports that as `unauthenticated`.
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth]
//! algorithm = "RS256"
//! public_key_path = "/etc/pushgate/idp.pem"
//! issuer = "https://securetoken.google.com/my-project"
//! audience = "my-project"
//! ```

use std::convert::Infallible;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use pushgate_notifications::CallerIdentity;
use serde::{Deserialize, Serialize};

/// Signature algorithm of incoming ID tokens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenAlgorithm {
    #[default]
    HS256,
    RS256,
    ES256,
}

impl From<TokenAlgorithm> for Algorithm {
    fn from(alg: TokenAlgorithm) -> Self {
        match alg {
            TokenAlgorithm::HS256 => Algorithm::HS256,
            TokenAlgorithm::RS256 => Algorithm::RS256,
            TokenAlgorithm::ES256 => Algorithm::ES256,
        }
    }
}

/// Token verification settings (the `[auth]` config section).
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub algorithm: TokenAlgorithm,

    /// Shared secret for HS256
    pub secret: Option<String>,

    /// PEM public key for RS256 / ES256
    pub public_key_path: Option<PathBuf>,

    /// Expected `iss` claim, if any
    pub issuer: Option<String>,

    /// Expected `aud` claim, if any
    pub audience: Option<String>,

    /// Clock skew tolerance in seconds
    pub leeway_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            algorithm: TokenAlgorithm::default(),
            secret: None,
            public_key_path: None,
            issuer: None,
            audience: None,
            leeway_secs: 60,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("algorithm", &self.algorithm)
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .field("public_key_path", &self.public_key_path)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self.algorithm {
            TokenAlgorithm::HS256 => {
                if self.secret.as_deref().unwrap_or("").is_empty() {
                    return Err("auth.algorithm=HS256 requires auth.secret".into());
                }
            }
            TokenAlgorithm::RS256 | TokenAlgorithm::ES256 => {
                if self.public_key_path.is_none() {
                    return Err(format!(
                        "auth.algorithm={:?} requires auth.public_key_path",
                        self.algorithm
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing key material: {0}")]
    MissingKey(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

#[derive(Deserialize)]
struct IdTokenClaims {
    sub: String,
}

/// Verifies bearer tokens and turns them into caller identities
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let key = match config.algorithm {
            TokenAlgorithm::HS256 => {
                let secret = config
                    .secret
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| AuthError::MissingKey("auth.secret".into()))?;
                DecodingKey::from_secret(secret.as_bytes())
            }
            TokenAlgorithm::RS256 | TokenAlgorithm::ES256 => {
                let path = config
                    .public_key_path
                    .as_ref()
                    .ok_or_else(|| AuthError::MissingKey("auth.public_key_path".into()))?;
                let pem = std::fs::read(path).map_err(|e| {
                    AuthError::InvalidKey(format!("failed to read {}: {e}", path.display()))
                })?;
                let decoded = if config.algorithm == TokenAlgorithm::RS256 {
                    DecodingKey::from_rsa_pem(&pem)
                } else {
                    DecodingKey::from_ec_pem(&pem)
                };
                decoded.map_err(|e| AuthError::InvalidKey(e.to_string()))?
            }
        };

        let mut validation = Validation::new(config.algorithm.into());
        validation.leeway = config.leeway_secs;
        // iss and aud are only checked when present, so pinned ones are also required
        let mut required = vec!["exp", "sub"];
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
            required.push("iss");
        }
        match &config.audience {
            Some(audience) => {
                validation.set_audience(&[audience]);
                required.push("aud");
            }
            None => validation.validate_aud = false,
        }
        validation.set_required_spec_claims(&required);

        Ok(Self { key, validation })
    }

    /// Verify a raw token
    pub fn verify(&self, token: &str) -> Result<CallerIdentity, AuthError> {
        let data = decode::<IdTokenClaims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        Ok(CallerIdentity::new(data.claims.sub))
    }

    /// Resolve an `Authorization` header value to a caller, if any
    pub fn identify(&self, authorization: Option<&str>) -> Option<CallerIdentity> {
        let token = match authorization.and_then(|h| h.strip_prefix("Bearer ")) {
            Some(t) if !t.is_empty() => t,
            _ => {
                tracing::debug!("No bearer token presented");
                return None;
            }
        };

        match self.verify(token) {
            Ok(identity) => Some(identity),
            Err(e) => {
                tracing::debug!(error = %e, "Token validation failed");
                None
            }
        }
    }
}

/// Caller identity of the current request, or `None` when the request is
/// not authenticated. Never rejects.
#[derive(Debug, Clone)]
pub struct OptionalCaller(pub Option<CallerIdentity>);

impl<S> FromRequestParts<S> for OptionalCaller
where
    S: Send + Sync,
    Arc<JwtVerifier>: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = Arc::<JwtVerifier>::from_ref(state);
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        Ok(OptionalCaller(verifier.identify(header)))
    }
}
