//! Error types for authentication operations
//!
//! This module defines the errors that can occur while talking to the
//! identity provider, the user directory, and while signing or validating
//! custom tokens.

use thiserror::Error;

/// Authentication error types.
///
/// These cover identity-provider failures, user-directory failures, token
/// signing and validation problems, and configuration issues.
#[derive(Debug, Error)]
pub enum AuthError {
    /// An upstream API answered with a non-success status
    #[error("Upstream API error ({status}): {body}")]
    Upstream {
        /// HTTP status code returned upstream
        status: u16,
        /// Response body, as text
        body: String,
    },

    /// The request never produced a response (connect, TLS, timeout)
    #[error("Request failed: {0}")]
    Request(String),

    /// An upstream response could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The user directory rejected an operation
    #[error("Provider error ({code}): {message}")]
    Provider {
        /// Provider error code (e.g. `EMAIL_EXISTS`)
        code: String,
        /// Human-readable message
        message: String,
    },

    /// A uid is empty or too long
    #[error("Invalid uid: {0}")]
    InvalidUid(String),

    /// Custom or developer claims are not acceptable
    #[error("Invalid claims: {0}")]
    InvalidClaims(String),

    /// Token has expired
    #[error("Token has expired")]
    TokenExpired,

    /// Token is invalid (malformed, bad signature, etc.)
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Check if this error should be logged at error level.
    ///
    /// Rejected tokens and claims are caller mistakes and are logged lower.
    pub fn is_server_error(&self) -> bool {
        !matches!(
            self,
            AuthError::TokenExpired
                | AuthError::InvalidToken(_)
                | AuthError::InvalidUid(_)
                | AuthError::InvalidClaims(_)
        )
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::TokenExpired | AuthError::InvalidToken(_) => 401,
            AuthError::InvalidUid(_) | AuthError::InvalidClaims(_) => 400,
            AuthError::Upstream { .. } | AuthError::Request(_) | AuthError::InvalidResponse(_) => {
                502
            }
            AuthError::Provider { .. } | AuthError::ConfigError(_) | AuthError::Internal(_) => 500,
        }
    }

    /// Get error code for API responses and logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Upstream { .. } => "UPSTREAM_ERROR",
            AuthError::Request(_) => "REQUEST_FAILED",
            AuthError::InvalidResponse(_) => "INVALID_RESPONSE",
            AuthError::Provider { .. } => "PROVIDER_ERROR",
            AuthError::InvalidUid(_) => "INVALID_UID",
            AuthError::InvalidClaims(_) => "INVALID_CLAIMS",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::InvalidToken(_) => "INVALID_TOKEN",
            AuthError::ConfigError(_) => "CONFIG_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Status of the upstream HTTP response behind this failure, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        self.upstream_response().map(|(status, _)| status)
    }

    /// Upstream status and body, when the failure came from an HTTP response.
    pub fn upstream_response(&self) -> Option<(u16, &str)> {
        match self {
            AuthError::Upstream { status, body } => Some((*status, body.as_str())),
            _ => None,
        }
    }
}
