use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use jsonwebtoken::{EncodingKey, Header, encode};
use pushgate_notifications::{
    NotificationDispatcher, NotificationError, ProviderMessage, PushProvider, SendResult,
};
use pushgate_server::{AppConfig, AppState, AuthConfig, JwtVerifier, build_app};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

const SECRET: &str = "integration-secret";

struct RecordingProvider {
    calls: AtomicUsize,
    sent: Mutex<Vec<ProviderMessage>>,
    outcome: Result<String, String>,
}

impl RecordingProvider {
    fn new(outcome: Result<&str, &str>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            outcome: outcome.map(str::to_string).map_err(str::to_string),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushProvider for RecordingProvider {
    async fn send(&self, message: &ProviderMessage) -> Result<SendResult, NotificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(message.clone());
        match &self.outcome {
            Ok(id) => Ok(SendResult {
                message_id: id.clone(),
            }),
            Err(detail) => Err(NotificationError::SendFailed(detail.clone())),
        }
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

struct TestServer {
    base: String,
    shutdown: tokio::sync::oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}

async fn start_server(provider: Arc<RecordingProvider>) -> TestServer {
    start_server_with(provider, AppConfig::default()).await
}

async fn start_server_with(provider: Arc<RecordingProvider>, cfg: AppConfig) -> TestServer {
    let auth = AuthConfig {
        secret: Some(SECRET.into()),
        ..Default::default()
    };
    let state = AppState {
        dispatcher: NotificationDispatcher::new(provider),
        verifier: Arc::new(JwtVerifier::from_config(&auth).expect("verifier")),
    };
    let app = build_app(state, &cfg);

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    TestServer {
        base: format!("http://{addr}"),
        shutdown: tx,
        handle,
    }
}

fn id_token() -> String {
    let exp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 600;
    encode(
        &Header::default(),
        &json!({"sub": "user-42", "exp": exp}),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn valid_payload() -> Value {
    json!({
        "data": {
            "token": "device-token",
            "title": "Hello",
            "body": "World",
            "type": "reminder",
            "data": {"foo": "bar"}
        }
    })
}

async fn call(base: &str, token: Option<&str>, body: Value) -> (u16, Value) {
    let client = reqwest::Client::new();
    let mut req = client.post(format!("{base}/sendNotification")).json(&body);
    if let Some(token) = token {
        req = req.bearer_auth(token);
    }
    let resp = req.send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn authenticated_request_is_dispatched() {
    let provider = RecordingProvider::new(Ok("msg-123"));
    let server = start_server(provider.clone()).await;

    let (status, body) = call(&server.base, Some(&id_token()), valid_payload()).await;
    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!({"result": {"success": true, "messageId": "msg-123"}})
    );
    assert_eq!(provider.calls(), 1);

    let sent = provider.sent.lock().unwrap()[0].clone();
    assert_eq!(sent.token, "device-token");
    assert_eq!(sent.data["type"], "reminder");
    assert_eq!(sent.data["foo"], "bar");

    server.stop().await;
}

#[tokio::test]
async fn missing_or_invalid_token_is_unauthenticated() {
    let provider = RecordingProvider::new(Ok("msg-1"));
    let server = start_server(provider.clone()).await;

    for token in [None, Some("not.a.jwt")] {
        let (status, body) = call(&server.base, token, valid_payload()).await;
        assert_eq!(status, 401);
        assert_eq!(body["error"]["code"], "unauthenticated");
        assert_eq!(body["error"]["status"], "UNAUTHENTICATED");
    }

    // Payload validity does not matter without a caller
    let (status, _) = call(&server.base, None, json!({"data": {}})).await;
    assert_eq!(status, 401);

    assert_eq!(provider.calls(), 0);
    server.stop().await;
}

#[tokio::test]
async fn missing_fields_are_invalid_argument() {
    let provider = RecordingProvider::new(Ok("msg-1"));
    let server = start_server(provider.clone()).await;
    let token = id_token();

    for body in [
        json!({"data": {"title": "Hello", "body": "World", "type": "reminder"}}),
        json!({"data": {"token": "t", "title": "", "body": "World", "type": "reminder"}}),
        json!({"data": {"token": "t", "title": "Hello", "body": "World"}}),
        json!({"data": {}}),
        json!({}),
    ] {
        let (status, body) = call(&server.base, Some(&token), body).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"]["code"], "invalid-argument");
        assert_eq!(body["error"]["message"], "Missing required fields");
    }

    assert_eq!(provider.calls(), 0);
    server.stop().await;
}

#[tokio::test]
async fn unreadable_body_is_invalid_argument() {
    let provider = RecordingProvider::new(Ok("msg-1"));
    let server = start_server(provider.clone()).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/sendNotification", server.base))
        .bearer_auth(id_token())
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "invalid-argument");

    assert_eq!(provider.calls(), 0);
    server.stop().await;
}

#[tokio::test]
async fn oversized_body_is_classified_like_any_unreadable_payload() {
    let provider = RecordingProvider::new(Ok("msg-1"));
    let mut cfg = AppConfig::default();
    cfg.server.body_limit_bytes = 32;
    let server = start_server_with(provider.clone(), cfg).await;

    let (status, body) = call(&server.base, Some(&id_token()), valid_payload()).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "invalid-argument");

    let (status, body) = call(&server.base, None, valid_payload()).await;
    assert_eq!(status, 401);
    assert_eq!(body["error"]["code"], "unauthenticated");

    assert_eq!(provider.calls(), 0);
    server.stop().await;
}

#[tokio::test]
async fn provider_failure_is_internal_without_detail() {
    let provider = RecordingProvider::new(Err("quota exceeded for project demo"));
    let server = start_server(provider.clone()).await;

    let (status, body) = call(&server.base, Some(&id_token()), valid_payload()).await;
    assert_eq!(status, 500);
    assert_eq!(body["error"]["code"], "internal");
    assert_eq!(body["error"]["message"], "Error sending notification");
    assert!(!body.to_string().contains("quota"));
    assert_eq!(provider.calls(), 1);

    server.stop().await;
}

#[tokio::test]
async fn repeated_calls_are_not_deduplicated() {
    let provider = RecordingProvider::new(Ok("msg-1"));
    let server = start_server(provider.clone()).await;
    let token = id_token();

    call(&server.base, Some(&token), valid_payload()).await;
    call(&server.base, Some(&token), valid_payload()).await;
    assert_eq!(provider.calls(), 2);

    server.stop().await;
}

#[tokio::test]
async fn health_endpoints_and_request_id() {
    let provider = RecordingProvider::new(Ok("msg-1"));
    let server = start_server(provider).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/healthz", server.base))
        .header("x-request-id", "req-abc")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert_eq!(resp.headers()["x-request-id"], "req-abc");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let resp = client
        .get(format!("{}/readyz", server.base))
        .send()
        .await
        .unwrap();
    assert!(resp.headers().contains_key("x-request-id"));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ready");

    let resp = client.get(format!("{}/", server.base)).send().await.unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["service"], "Pushgate");

    server.stop().await;
}
