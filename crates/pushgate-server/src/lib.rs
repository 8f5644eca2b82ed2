pub mod auth;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod server;

pub use auth::{AuthConfig, AuthError, JwtVerifier, OptionalCaller, TokenAlgorithm};
pub use config::{AppConfig, LoggingConfig, ServerConfig};
pub use observability::init_tracing;
pub use server::{AppState, PushgateServer, ServerBuilder, build_app};
