use axum::{
    Json,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::StatusCode,
    response::IntoResponse,
};
use pushgate_api::{ApiError, CallableRequest, CallableResult};
use pushgate_notifications::{DispatchReceipt, NotificationDispatcher};
use serde::Serialize;
use serde_json::{Value, json};

use crate::auth::OptionalCaller;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "Pushgate",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn readyz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ready" }))
}

/// POST /sendNotification
///
/// Callable endpoint: `{"data": {token, title, body, type, data?}}` in,
/// `{"result": {success, messageId}}` or `{"error": {...}}` out.
///
/// The body is read raw so that authentication is decided before anything
/// about the payload is reported back. A body that cannot be read at all
/// (e.g. over the size limit) is treated like an empty envelope.
pub async fn send_notification(
    State(dispatcher): State<NotificationDispatcher>,
    OptionalCaller(caller): OptionalCaller,
    body: Result<Bytes, BytesRejection>,
) -> Result<CallableResult<DispatchReceipt>, ApiError> {
    if let Some(caller) = &caller {
        tracing::debug!(subject = %caller.subject, "sendNotification called");
    }

    let payload = match body {
        Ok(bytes) => callable_data(&bytes),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unreadable request body");
            Value::Null
        }
    };
    let receipt = dispatcher.dispatch_value(caller.as_ref(), payload).await?;
    Ok(CallableResult::new(receipt))
}

/// Extract the `data` member of a callable envelope; anything unreadable
/// becomes `null`, which the dispatcher rejects as an invalid argument.
fn callable_data(body: &[u8]) -> Value {
    match serde_json::from_slice::<CallableRequest<Value>>(body) {
        Ok(envelope) => envelope.data.unwrap_or(Value::Null),
        Err(e) => {
            tracing::debug!(error = %e, "Unreadable callable envelope");
            Value::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callable_data_extracts_data_member() {
        let value = callable_data(br#"{"data": {"title": "hi"}}"#);
        assert_eq!(value, json!({"title": "hi"}));
    }

    #[test]
    fn callable_data_maps_unreadable_bodies_to_null() {
        assert_eq!(callable_data(b""), Value::Null);
        assert_eq!(callable_data(b"not json"), Value::Null);
        assert_eq!(callable_data(br#"{"other": 1}"#), Value::Null);
        assert_eq!(callable_data(br#""a string""#), Value::Null);
    }
}
