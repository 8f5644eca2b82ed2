//! Validation and dispatch of a single push notification.

use std::sync::Arc;

use crate::adapters::PushProvider;
use crate::error::DispatchError;
use crate::types::{CallerIdentity, DispatchReceipt, DispatchRequest, ProviderMessage};

pub type DispatchResult = Result<DispatchReceipt, DispatchError>;

/// Sends one notification per call through a shared provider.
///
/// Holds no per-call state; clones share the same provider handle.
#[derive(Clone)]
pub struct NotificationDispatcher {
    provider: Arc<dyn PushProvider>,
}

impl NotificationDispatcher {
    pub fn new(provider: Arc<dyn PushProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Authenticate, validate and send.
    ///
    /// Only the provider call can fail with [`DispatchError::Internal`]; the
    /// other two classifications return before the provider is touched.
    pub async fn dispatch(
        &self,
        caller: Option<&CallerIdentity>,
        request: &DispatchRequest,
    ) -> DispatchResult {
        if caller.is_none() {
            return Err(DispatchError::Unauthenticated);
        }

        let validated = request.validate()?;
        let message = ProviderMessage::from_request(&validated);

        match self.provider.send(&message).await {
            Ok(sent) => {
                tracing::info!(
                    provider = self.provider.name(),
                    message_id = %sent.message_id,
                    "Successfully sent message"
                );
                Ok(DispatchReceipt::new(sent.message_id))
            }
            Err(e) => {
                tracing::error!(
                    provider = self.provider.name(),
                    error = %e,
                    "Error sending message"
                );
                Err(DispatchError::Internal)
            }
        }
    }

    /// Same as [`dispatch`](Self::dispatch) for a raw JSON payload.
    ///
    /// The caller is checked before the payload is read, so an
    /// unauthenticated caller never learns whether the payload was readable.
    pub async fn dispatch_value(
        &self,
        caller: Option<&CallerIdentity>,
        payload: serde_json::Value,
    ) -> DispatchResult {
        if caller.is_none() {
            return Err(DispatchError::Unauthenticated);
        }
        let request = DispatchRequest::from_value(payload)?;
        self.dispatch(caller, &request).await
    }
}
