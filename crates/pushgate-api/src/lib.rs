use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// -------------------------
// Callable envelopes
// -------------------------

/// Request envelope of a callable endpoint: `{"data": ...}`.
///
/// `data` is kept optional so that a missing member can be reported as an
/// invalid argument after the caller has been authenticated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CallableRequest<T> {
    #[serde(default)]
    pub data: Option<T>,
}

/// Successful response envelope: `{"result": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallableResult<T> {
    pub result: T,
}

impl<T> CallableResult<T> {
    pub fn new(result: T) -> Self {
        Self { result }
    }
}

impl<T: Serialize> IntoResponse for CallableResult<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, axum::Json(self)).into_response()
    }
}

/// Error response envelope: `{"error": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetail {
    /// Canonical status name, e.g. `INVALID_ARGUMENT`
    pub status: String,
    /// Machine-readable code, e.g. `invalid-argument`
    pub code: String,
    /// Human-readable description
    pub message: String,
}

// -------------------------
// Errors
// -------------------------

/// Caller-visible errors of a callable endpoint.
///
/// These are the only classifications a caller ever sees. Anything that goes
/// wrong inside the service is reported as `Internal` with a generic message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code: `unauthenticated` | `invalid-argument` | `internal`
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::InvalidArgument(_) => "invalid-argument",
            ApiError::Internal(_) => "internal",
        }
    }

    /// Canonical status name used in the error envelope
    pub fn status(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "UNAUTHENTICATED",
            ApiError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Unauthenticated(msg)
            | ApiError::InvalidArgument(msg)
            | ApiError::Internal(msg) => msg,
        }
    }

    pub fn to_error_body(&self) -> ErrorBody {
        ErrorBody {
            error: ErrorDetail {
                status: self.status().to_string(),
                code: self.code().to_string(),
                message: self.message().to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = serde_json::to_vec(&self.to_error_body()).unwrap_or_else(|_| {
            // Fallback minimal body if serialization fails
            br#"{"error":{"status":"INTERNAL","code":"internal","message":"Serialization failure"}}"#
                .to_vec()
        });

        (
            status,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            body,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_response_sets_status_and_content_type() {
        let resp = ApiError::invalid_argument("Missing required fields").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap();
        assert_eq!(content_type, &HeaderValue::from_static("application/json"));
    }

    #[test]
    fn api_error_variants_map_to_status_and_codes() {
        let cases: Vec<(ApiError, StatusCode, &str, &str)> = vec![
            (
                ApiError::unauthenticated("x"),
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "UNAUTHENTICATED",
            ),
            (
                ApiError::invalid_argument("x"),
                StatusCode::BAD_REQUEST,
                "invalid-argument",
                "INVALID_ARGUMENT",
            ),
            (
                ApiError::internal("x"),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "INTERNAL",
            ),
        ];

        for (err, status, code, name) in cases {
            assert_eq!(err.status_code(), status);
            assert_eq!(err.code(), code);
            assert_eq!(err.status(), name);
        }
    }

    #[test]
    fn error_body_shape() {
        let body = ApiError::internal("Error sending notification").to_error_body();
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["error"]["code"], "internal");
        assert_eq!(value["error"]["status"], "INTERNAL");
        assert_eq!(value["error"]["message"], "Error sending notification");
    }

    #[test]
    fn callable_request_tolerates_missing_data() {
        let req: CallableRequest<serde_json::Value> = serde_json::from_str("{}").unwrap();
        assert!(req.data.is_none());

        let req: CallableRequest<serde_json::Value> =
            serde_json::from_str(r#"{"data": {"title": "hi"}}"#).unwrap();
        assert_eq!(req.data.unwrap()["title"], "hi");
    }

    #[test]
    fn callable_result_wraps_payload() {
        let value = serde_json::to_value(CallableResult::new(serde_json::json!({"ok": true})))
            .unwrap();
        assert_eq!(value, serde_json::json!({"result": {"ok": true}}));
    }
}
