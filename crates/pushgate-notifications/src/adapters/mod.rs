pub mod fcm;

use async_trait::async_trait;

use crate::error::NotificationError;
use crate::types::ProviderMessage;

/// Result of a successful provider send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    /// Provider-assigned message identifier
    pub message_id: String,
}

/// Push-delivery provider.
///
/// Implementations are shared across concurrent requests and must not need
/// per-call mutation from the caller's side.
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Send one message to its target device
    async fn send(&self, message: &ProviderMessage) -> Result<SendResult, NotificationError>;

    /// Short provider name for logs
    fn name(&self) -> &'static str;
}

pub use fcm::FcmAdapter;
