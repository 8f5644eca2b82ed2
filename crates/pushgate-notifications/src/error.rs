use pushgate_api::ApiError;
use thiserror::Error;

/// Failures inside a push provider.
///
/// These carry provider detail and are only ever logged; callers see a
/// [`DispatchError::Internal`] instead.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Provider authentication failed: {0}")]
    Auth(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Provider rejected message ({status} {code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Caller-visible classification of a failed dispatch.
///
/// `Display` is the generic message returned to the caller.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("The function must be called while authenticated.")]
    Unauthenticated,

    #[error("Missing required fields")]
    InvalidArgument,

    #[error("Error sending notification")]
    Internal,
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        let message = err.to_string();
        match err {
            DispatchError::Unauthenticated => ApiError::Unauthenticated(message),
            DispatchError::InvalidArgument => ApiError::InvalidArgument(message),
            DispatchError::Internal => ApiError::Internal(message),
        }
    }
}
