//! Firebase Cloud Messaging adapter (HTTP v1 API).
//!
//! Messages are posted to `/v1/projects/{project}/messages:send`. Requests are
//! authorized either with a static bearer token or with OAuth access tokens
//! obtained through the JWT-bearer grant using a service-account key. Access
//! tokens are cached until shortly before they expire.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{PushProvider, SendResult};
use crate::error::NotificationError;
use crate::provider::{FcmConfig, ServiceAccountKey};
use crate::types::ProviderMessage;

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

enum Credentials {
    Static(String),
    ServiceAccount {
        key: ServiceAccountKey,
        cache: RwLock<Option<CachedToken>>,
    },
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS as u64
}

#[derive(Deserialize)]
struct SendResponse {
    name: String,
}

#[derive(Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<Value>,
}

impl GoogleError {
    /// FCM-specific error code (e.g. `UNREGISTERED`) if present, else the
    /// canonical status.
    fn code(&self) -> String {
        self.details
            .iter()
            .filter(|d| {
                d["@type"]
                    .as_str()
                    .is_some_and(|t| t.ends_with("google.firebase.fcm.v1.FcmError"))
            })
            .find_map(|d| d["errorCode"].as_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.status.clone())
    }
}

pub struct FcmAdapter {
    http_client: Client,
    endpoint: String,
    project_id: String,
    validate_only: bool,
    credentials: Credentials,
}

impl FcmAdapter {
    /// Build the adapter from configuration, loading the service-account key
    /// if one is configured.
    pub fn from_config(config: &FcmConfig) -> Result<Self, NotificationError> {
        config.validate().map_err(NotificationError::InvalidConfig)?;

        let (credentials, account_project) = match &config.service_account_path {
            Some(path) => {
                let key = ServiceAccountKey::from_file(path)?;
                let project = key.project_id.clone();
                (
                    Credentials::ServiceAccount {
                        key,
                        cache: RwLock::new(None),
                    },
                    project,
                )
            }
            None => {
                let token = config.access_token.clone().ok_or_else(|| {
                    NotificationError::InvalidConfig("Missing access_token".into())
                })?;
                (Credentials::Static(token), None)
            }
        };

        let project_id = config
            .project_id
            .clone()
            .filter(|p| !p.is_empty())
            .or(account_project)
            .ok_or_else(|| NotificationError::InvalidConfig("Missing project_id".into()))?;

        Ok(Self {
            http_client: Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            project_id,
            validate_only: config.validate_only,
            credentials,
        })
    }

    pub fn with_access_token(project_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            endpoint: crate::provider::DEFAULT_FCM_ENDPOINT.to_string(),
            project_id: project_id.into(),
            validate_only: false,
            credentials: Credentials::Static(access_token.into()),
        }
    }

    pub fn with_service_account(project_id: impl Into<String>, key: ServiceAccountKey) -> Self {
        Self {
            http_client: Client::new(),
            endpoint: crate::provider::DEFAULT_FCM_ENDPOINT.to_string(),
            project_id: project_id.into(),
            validate_only: false,
            credentials: Credentials::ServiceAccount {
                key,
                cache: RwLock::new(None),
            },
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_validate_only(mut self, validate_only: bool) -> Self {
        self.validate_only = validate_only;
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.endpoint, self.project_id
        )
    }

    /// Map a provider-neutral message onto the FCM v1 request body.
    ///
    /// The click action is platform-specific in v1, so it goes into the
    /// Android notification and the APNs category.
    fn request_body(&self, message: &ProviderMessage) -> Value {
        let click_action = &message.notification.click_action;
        json!({
            "validate_only": self.validate_only,
            "message": {
                "token": &message.token,
                "notification": {
                    "title": &message.notification.title,
                    "body": &message.notification.body,
                },
                "data": &message.data,
                "android": {
                    "notification": { "click_action": click_action }
                },
                "apns": {
                    "payload": { "aps": { "category": click_action } }
                }
            }
        })
    }

    async fn access_token(&self) -> Result<String, NotificationError> {
        let (key, cache) = match &self.credentials {
            Credentials::Static(token) => return Ok(token.clone()),
            Credentials::ServiceAccount { key, cache } => (key, cache),
        };

        if let Some(cached) = cache.read().await.as_ref().filter(|t| t.is_fresh()) {
            return Ok(cached.access_token.clone());
        }

        let mut guard = cache.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(cached) = guard.as_ref().filter(|t| t.is_fresh()) {
            return Ok(cached.access_token.clone());
        }

        let fresh = self.fetch_access_token(key).await?;
        let token = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(token)
    }

    async fn fetch_access_token(
        &self,
        key: &ServiceAccountKey,
    ) -> Result<CachedToken, NotificationError> {
        let assertion = build_assertion(key, OffsetDateTime::now_utc().unix_timestamp())?;

        tracing::debug!(
            client_email = %key.client_email,
            token_uri = %key.token_uri,
            "Requesting FCM access token"
        );

        let response = self
            .http_client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| NotificationError::Auth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Auth(format!(
                "Token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| NotificationError::Auth(format!("Invalid token response: {e}")))?;

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }
}

/// Sign the service-account assertion for the JWT-bearer grant
fn build_assertion(key: &ServiceAccountKey, now: i64) -> Result<String, NotificationError> {
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| NotificationError::Auth(format!("Invalid service account key: {e}")))?;

    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: FCM_SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };

    encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| NotificationError::Auth(format!("Failed to sign assertion: {e}")))
}

#[async_trait]
impl PushProvider for FcmAdapter {
    async fn send(&self, message: &ProviderMessage) -> Result<SendResult, NotificationError> {
        let access_token = self.access_token().await?;

        let response = self
            .http_client
            .post(self.send_url())
            .bearer_auth(access_token)
            .json(&self.request_body(message))
            .send()
            .await
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body: SendResponse = response
                .json()
                .await
                .map_err(|e| NotificationError::SendFailed(format!("Invalid FCM response: {e}")))?;
            return Ok(SendResult {
                message_id: body.name,
            });
        }

        let text = response.text().await.unwrap_or_default();
        let error = match serde_json::from_str::<GoogleErrorEnvelope>(&text) {
            Ok(envelope) => NotificationError::Rejected {
                status: status.as_u16(),
                code: envelope.error.code(),
                message: envelope.error.message,
            },
            Err(_) => NotificationError::Rejected {
                status: status.as_u16(),
                code: status.canonical_reason().unwrap_or("UNKNOWN").to_string(),
                message: text,
            },
        };
        Err(error)
    }

    fn name(&self) -> &'static str {
        "fcm"
    }
}
