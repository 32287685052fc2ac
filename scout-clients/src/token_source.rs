//! OAuth2 access tokens for the service account.
//!
//! The Firebase Auth admin API wants a Google OAuth2 access token. The
//! service account gets one by signing a JWT-bearer assertion and trading
//! it at the token endpoint. Tokens are reused until shortly before they
//! expire.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use scout_auth::{AuthError, CustomTokenSigner};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

/// Scopes the admin API calls need.
pub const ADMIN_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/identitytoolkit",
    "https://www.googleapis.com/auth/userinfo.email",
];

/// Grant type for service account assertions.
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Refresh this long before the token expires.
fn expiry_margin() -> Duration {
    Duration::seconds(60)
}

/// Token source errors.
#[derive(Debug, Error)]
pub enum TokenSourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The token endpoint refused the grant.
    #[error("Token grant rejected ({status}): {message}")]
    GrantRejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// Invalid response from the token endpoint.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    /// The assertion could not be signed.
    #[error("Assertion signing failed: {0}")]
    Signing(#[from] AuthError),
}

impl From<TokenSourceError> for AuthError {
    fn from(err: TokenSourceError) -> Self {
        match err {
            TokenSourceError::RequestFailed(e) => AuthError::Request(e.to_string()),
            TokenSourceError::GrantRejected { status, message } => AuthError::Upstream {
                status,
                body: message,
            },
            TokenSourceError::InvalidResponse(message) => AuthError::InvalidResponse(message),
            TokenSourceError::Signing(e) => e,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Utc::now() + expiry_margin() < self.expires_at
    }
}

/// Access tokens for a service account.
pub struct ServiceAccountTokenSource {
    client: Client,
    signer: Arc<CustomTokenSigner>,
    token_uri: String,
    cached: RwLock<Option<CachedToken>>,
}

impl std::fmt::Debug for ServiceAccountTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountTokenSource")
            .field("token_uri", &self.token_uri)
            .field("signer", &self.signer)
            .finish()
    }
}

impl ServiceAccountTokenSource {
    /// Create a token source that signs assertions with `signer`.
    pub fn new(client: Client, signer: Arc<CustomTokenSigner>, token_uri: impl Into<String>) -> Self {
        Self {
            client,
            signer,
            token_uri: token_uri.into(),
            cached: RwLock::new(None),
        }
    }

    /// A valid access token, fetching a new one when needed.
    #[instrument(skip(self))]
    pub async fn access_token(&self) -> Result<String, TokenSourceError> {
        if let Some(token) = self.cached.read().await.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        let mut cached = self.cached.write().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        let token = self.fetch_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);

        Ok(access_token)
    }

    async fn fetch_token(&self) -> Result<CachedToken, TokenSourceError> {
        debug!("Requesting service account access token");

        let assertion = self.signer.create_assertion(ADMIN_SCOPES, &self.token_uri)?;
        let response = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("Token endpoint error ({}): {}", status.as_u16(), message);
            return Err(TokenSourceError::GrantRejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| TokenSourceError::InvalidResponse(e.to_string()))?;

        Ok(CachedToken {
            access_token: body.access_token,
            expires_at: Utc::now() + Duration::seconds(body.expires_in),
        })
    }
}
