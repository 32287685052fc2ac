//! ID.me service client.
//!
//! HTTP client for the ID.me attributes API. The caller's ID.me access
//! token is forwarded as a bearer credential; the response carries the
//! identity's attributes and group verification status.

use super::config::ServiceEndpoint;
use async_trait::async_trait;
use reqwest::Client;
use scout_auth::{AuthError, AuthResult, IdentityProviderClient, IdmeProfile};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

/// Path of the attributes endpoint.
pub const ATTRIBUTES_PATH: &str = "/api/public/v3/attributes.json";

/// ID.me client errors.
#[derive(Debug, Error)]
pub enum IdmeError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// Invalid response from the API.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// The access token was rejected.
    #[error("Authentication failed ({status}): {message}")]
    AuthenticationFailed {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },
}

impl From<IdmeError> for AuthError {
    fn from(err: IdmeError) -> Self {
        match err {
            IdmeError::RequestFailed(e) => AuthError::Request(e.to_string()),
            IdmeError::ApiError { status, message }
            | IdmeError::AuthenticationFailed { status, message } => AuthError::Upstream {
                status,
                body: message,
            },
            IdmeError::InvalidResponse(message) => AuthError::InvalidResponse(message),
        }
    }
}

/// ID.me service client.
#[derive(Clone)]
pub struct IdmeClient {
    /// HTTP client instance.
    client: Client,

    /// Service endpoint configuration.
    endpoint: ServiceEndpoint,
}

impl std::fmt::Debug for IdmeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdmeClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl IdmeClient {
    /// Create a new ID.me client.
    pub fn new(endpoint: ServiceEndpoint, timeout: Duration) -> Result<Self, IdmeError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, endpoint })
    }

    /// Fetch the attributes and verification status for an access token.
    #[instrument(skip(self, access_token))]
    pub async fn get_attributes(&self, access_token: &str) -> Result<IdmeProfile, IdmeError> {
        debug!("Fetching user data from ID.me");

        let url = self.endpoint.url(ATTRIBUTES_PATH);
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                error!("ID.me request failed: {}", e);
                IdmeError::RequestFailed(e)
            })?;

        self.handle_response(response).await
    }

    async fn handle_response(&self, response: reqwest::Response) -> Result<IdmeProfile, IdmeError> {
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let message = response.text().await.unwrap_or_default();
            warn!("ID.me rejected the access token ({})", status.as_u16());
            return Err(IdmeError::AuthenticationFailed {
                status: status.as_u16(),
                message,
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("ID.me API error ({}): {}", status.as_u16(), message);
            return Err(IdmeError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        debug!("ID.me API response status {}", status.as_u16());

        response
            .json()
            .await
            .map_err(|e| IdmeError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl IdentityProviderClient for IdmeClient {
    async fn fetch_profile(&self, access_token: &str) -> AuthResult<IdmeProfile> {
        Ok(self.get_attributes(access_token).await?)
    }
}
