//! Errors returned to callers of the exchange.
//!
//! Callers only ever see three kinds of failure. Everything that goes wrong
//! upstream collapses into `Internal`, keeping the upstream status and body
//! as error details when there was an HTTP response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scout_auth::AuthError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Kind of failure, as named on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallableErrorKind {
    /// The request is missing required input
    InvalidArgument,
    /// The identity is not verified for a recognized group
    PermissionDenied,
    /// Anything upstream failed
    Internal,
}

impl CallableErrorKind {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallableErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            CallableErrorKind::PermissionDenied => "PERMISSION_DENIED",
            CallableErrorKind::Internal => "INTERNAL",
        }
    }

    /// HTTP status the callable protocol pairs with this kind.
    pub fn status_code(&self) -> StatusCode {
        match self {
            CallableErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            CallableErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            CallableErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for CallableErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned by the exchange.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct CallableError {
    /// Failure kind
    pub kind: CallableErrorKind,

    /// Human-readable message
    pub message: String,

    /// Extra structured context, e.g. the upstream response
    pub details: Option<serde_json::Value>,
}

/// Result type for the exchange.
pub type CallableResult<T> = Result<T, CallableError>;

impl CallableError {
    /// Create an error of the given kind.
    pub fn new(kind: CallableErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Missing or malformed input.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(CallableErrorKind::InvalidArgument, message)
    }

    /// Identity not verified.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(CallableErrorKind::PermissionDenied, message)
    }

    /// Upstream or internal failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CallableErrorKind::Internal, message)
    }

    /// Attach details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// The error body of the callable protocol.
    pub fn to_body(&self) -> serde_json::Value {
        let mut error = json!({
            "status": self.kind.as_str(),
            "message": self.message,
        });
        if let Some(ref details) = self.details {
            error["details"] = details.clone();
        }
        json!({ "error": error })
    }
}

impl From<AuthError> for CallableError {
    fn from(err: AuthError) -> Self {
        let details = err.upstream_response().map(|(status, body)| {
            json!({
                "upstreamStatus": status,
                "upstreamBody": body,
            })
        });

        let mut error = CallableError::internal(err.to_string());
        error.details = details;
        error
    }
}

impl IntoResponse for CallableError {
    fn into_response(self) -> Response {
        (self.kind.status_code(), Json(self.to_body())).into_response()
    }
}
