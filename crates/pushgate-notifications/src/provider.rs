use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::NotificationError;

pub const DEFAULT_FCM_ENDPOINT: &str = "https://fcm.googleapis.com";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// FCM provider configuration (the `[fcm]` config section).
///
/// Credentials come either from a service-account key file, which is
/// exchanged for short-lived OAuth access tokens, or from a static access
/// token (emulators, local testing).
#[derive(Clone, Serialize, Deserialize)]
pub struct FcmConfig {
    /// Firebase project id. Falls back to the service account's project.
    #[serde(default)]
    pub project_id: Option<String>,

    /// Path to a Google service-account JSON key
    #[serde(default)]
    pub service_account_path: Option<PathBuf>,

    /// Static bearer token used instead of the service-account exchange
    #[serde(default)]
    pub access_token: Option<String>,

    /// Base URL of the FCM HTTP v1 API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Ask FCM to validate messages without delivering them
    #[serde(default)]
    pub validate_only: bool,
}

fn default_endpoint() -> String {
    DEFAULT_FCM_ENDPOINT.to_string()
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            service_account_path: None,
            access_token: None,
            endpoint: default_endpoint(),
            validate_only: false,
        }
    }
}

impl fmt::Debug for FcmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FcmConfig")
            .field("project_id", &self.project_id)
            .field("service_account_path", &self.service_account_path)
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("endpoint", &self.endpoint)
            .field("validate_only", &self.validate_only)
            .finish()
    }
}

impl FcmConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.service_account_path.is_none()
            && self.access_token.as_deref().unwrap_or("").is_empty()
        {
            return Err("fcm requires either service_account_path or access_token".into());
        }
        if self.access_token.is_some()
            && self.service_account_path.is_none()
            && self.project_id.as_deref().unwrap_or("").is_empty()
        {
            return Err("fcm.project_id is required when using access_token".into());
        }
        if self.endpoint.is_empty() {
            return Err("fcm.endpoint must not be empty".into());
        }
        Ok(())
    }
}

/// Google service-account key, as downloaded from the Firebase console
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"***")
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, NotificationError> {
        serde_json::from_str(json).map_err(|e| {
            NotificationError::InvalidConfig(format!("Invalid service account key: {e}"))
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, NotificationError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            NotificationError::InvalidConfig(format!(
                "Failed to read service account key {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&json)
    }
}
