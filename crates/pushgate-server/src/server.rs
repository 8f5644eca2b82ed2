use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    middleware,
    routing::{get, post},
};
use pushgate_notifications::{FcmAdapter, NotificationDispatcher, PushProvider};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{auth::JwtVerifier, config::AppConfig, handlers, middleware as app_middleware};

/// Shared handles for request handlers. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: NotificationDispatcher,
    pub verifier: Arc<JwtVerifier>,
}

impl FromRef<AppState> for NotificationDispatcher {
    fn from_ref(state: &AppState) -> Self {
        state.dispatcher.clone()
    }
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

pub struct PushgateServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(state: AppState, cfg: &AppConfig) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        // Callable endpoint
        .route("/sendNotification", post(handlers::send_notification))
        .with_state(state)
        // Middleware stack, innermost first: body limit <- trace <- cors <- request id
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .headers()
                        .get(app_middleware::REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(app_middleware::request_id))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    provider: Option<Arc<dyn PushProvider>>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
            provider: None,
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Use the given provider instead of building one from `[fcm]`
    pub fn with_provider(mut self, provider: Arc<dyn PushProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Initialize the provider client and the token verifier, then assemble
    /// the router.
    pub fn build(self) -> anyhow::Result<PushgateServer> {
        let provider: Arc<dyn PushProvider> = match self.provider {
            Some(p) => p,
            None => Arc::new(FcmAdapter::from_config(&self.config.fcm)?),
        };
        let dispatcher = NotificationDispatcher::new(provider);
        tracing::info!(
            provider = dispatcher.provider_name(),
            "Push provider initialized"
        );

        let verifier = Arc::new(JwtVerifier::from_config(&self.config.auth)?);
        let state = AppState {
            dispatcher,
            verifier,
        };

        Ok(PushgateServer {
            addr: self.addr,
            app: build_app(state, &self.config),
        })
    }
}

impl PushgateServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
