use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::DispatchError;

/// Click action attached to every notification so Flutter clients route taps
/// to the app's notification handler.
pub const CLICK_ACTION: &str = "FLUTTER_NOTIFICATION_CLICK";

/// Data key reserved for the notification category tag
pub const TYPE_KEY: &str = "type";

/// Verified caller of a dispatch.
///
/// Only its presence matters to the dispatcher; the subject is kept for
/// request logging by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub subject: String,
}

impl CallerIdentity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }
}

/// Request to send a single push notification.
///
/// All scalar fields are optional at the type level so that a missing field
/// and an empty one are rejected the same way by [`DispatchRequest::validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    /// Recipient device token
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    /// Caller-defined category tag
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Extra key/value pairs merged into the data block
    #[serde(default)]
    pub data: Option<BTreeMap<String, String>>,
}

/// A request that passed structural validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedRequest<'a> {
    pub token: &'a str,
    pub title: &'a str,
    pub body: &'a str,
    pub kind: &'a str,
    pub data: Option<&'a BTreeMap<String, String>>,
}

impl DispatchRequest {
    /// Read a request from an arbitrary JSON payload.
    ///
    /// Anything that is not an object of the expected shape (non-string
    /// scalars, non-string data values) is an invalid argument.
    pub fn from_value(value: serde_json::Value) -> Result<Self, DispatchError> {
        serde_json::from_value(value).map_err(|e| {
            tracing::debug!(error = %e, "Unreadable dispatch request");
            DispatchError::InvalidArgument
        })
    }

    /// Require token, title, body and type to be present and non-empty.
    pub fn validate(&self) -> Result<ValidatedRequest<'_>, DispatchError> {
        fn required(field: &Option<String>) -> Option<&str> {
            field.as_deref().filter(|s| !s.is_empty())
        }

        match (
            required(&self.token),
            required(&self.title),
            required(&self.body),
            required(&self.kind),
        ) {
            (Some(token), Some(title), Some(body), Some(kind)) => Ok(ValidatedRequest {
                token,
                title,
                body,
                kind,
                data: self.data.as_ref(),
            }),
            _ => Err(DispatchError::InvalidArgument),
        }
    }
}

/// Notification block of a provider message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageNotification {
    pub title: String,
    pub body: String,
    pub click_action: String,
}

/// Provider-neutral message handed to a [`crate::adapters::PushProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMessage {
    /// Target device token
    pub token: String,
    pub notification: MessageNotification,
    pub data: BTreeMap<String, String>,
}

impl ProviderMessage {
    /// Build the message for a validated request.
    ///
    /// Extra data is merged first and the reserved `type` key written last,
    /// so the request's type always wins over a colliding extra key.
    pub fn from_request(request: &ValidatedRequest<'_>) -> Self {
        let mut data = request.data.cloned().unwrap_or_default();
        if let Some(shadowed) = data.insert(TYPE_KEY.to_string(), request.kind.to_string()) {
            if shadowed != request.kind {
                tracing::debug!(
                    shadowed = %shadowed,
                    "Extra data key 'type' overridden by request type"
                );
            }
        }

        Self {
            token: request.token.to_string(),
            notification: MessageNotification {
                title: request.title.to_string(),
                body: request.body.to_string(),
                click_action: CLICK_ACTION.to_string(),
            },
            data,
        }
    }
}

/// Successful dispatch as seen by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReceipt {
    pub success: bool,
    pub message_id: String,
}

impl DispatchReceipt {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: message_id.into(),
        }
    }
}
