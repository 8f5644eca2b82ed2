pub mod adapters;
pub mod dispatcher;
pub mod error;
pub mod provider;
pub mod types;

pub use adapters::{FcmAdapter, PushProvider, SendResult};
pub use dispatcher::{DispatchResult, NotificationDispatcher};
pub use error::{DispatchError, NotificationError};
pub use provider::{FcmConfig, ServiceAccountKey};
pub use types::*;
