//! Firebase Auth admin client.
//!
//! HTTP client for the Identity Toolkit v1 admin API, scoped to one Firebase
//! project. Provides account lookup by email, account creation and custom
//! claim updates; custom tokens are signed locally with the service account
//! key, the same way the Admin SDK does it.

use super::config::{ServiceConfig, ServiceEndpoint};
use super::token_source::{ServiceAccountTokenSource, TokenSourceError};
use async_trait::async_trait;
use reqwest::Client;
use scout_auth::claims::serialize_custom_claims;
use scout_auth::{
    AuthError, AuthResult, CustomClaims, CustomTokenSigner, NewUser, ServiceAccountKey,
    UserDirectory, UserRecord,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

/// Issuer used for tokens minted against the emulator without a key.
const EMULATOR_ISSUER: &str = "firebase-auth-emulator@example.com";

/// The emulator does not check custom token signatures.
const EMULATOR_SECRET: &str = "firebase-auth-emulator";

/// Identity Toolkit client errors.
#[derive(Debug, Error)]
pub enum IdentityToolkitError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error ({status}) {code}: {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Error code, e.g. `EMAIL_EXISTS`.
        code: String,
        /// Full error message.
        message: String,
    },

    /// Invalid response from the API.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Client could not be configured.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Access token could not be obtained.
    #[error("Access token unavailable: {0}")]
    Token(#[from] TokenSourceError),

    /// Local validation or signing failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl From<IdentityToolkitError> for AuthError {
    fn from(err: IdentityToolkitError) -> Self {
        match err {
            IdentityToolkitError::RequestFailed(e) => AuthError::Request(e.to_string()),
            IdentityToolkitError::ApiError { code, message, .. } => {
                AuthError::Provider { code, message }
            }
            IdentityToolkitError::InvalidResponse(message) => AuthError::InvalidResponse(message),
            IdentityToolkitError::Config(message) => AuthError::ConfigError(message),
            IdentityToolkitError::Token(e) => e.into(),
            IdentityToolkitError::Auth(e) => e,
        }
    }
}

/// How requests are authorized.
enum ToolkitAuth {
    /// Real project: OAuth2 access token of the service account.
    ServiceAccount(ServiceAccountTokenSource),
    /// Local emulator: fixed `owner` bearer token.
    Emulator,
}

/// Firebase Auth admin client.
pub struct IdentityToolkitClient {
    /// HTTP client instance.
    client: Client,

    /// Service endpoint configuration.
    endpoint: ServiceEndpoint,

    /// Firebase project id.
    project_id: String,

    /// Request authorization.
    auth: ToolkitAuth,

    /// Signs custom tokens.
    signer: Arc<CustomTokenSigner>,
}

impl std::fmt::Debug for IdentityToolkitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityToolkitClient")
            .field("endpoint", &self.endpoint)
            .field("project_id", &self.project_id)
            .field("emulator", &matches!(self.auth, ToolkitAuth::Emulator))
            .finish()
    }
}

impl IdentityToolkitClient {
    /// Client for a real project, authorized as the service account.
    pub fn from_service_account(
        endpoint: ServiceEndpoint,
        project_id: impl Into<String>,
        key: &ServiceAccountKey,
        timeout: Duration,
    ) -> Result<Self, IdentityToolkitError> {
        let client = Client::builder().timeout(timeout).build()?;
        let signer = Arc::new(CustomTokenSigner::from_service_account(key)?);
        let token_source =
            ServiceAccountTokenSource::new(client.clone(), signer.clone(), key.token_uri.clone());

        Ok(Self {
            client,
            endpoint,
            project_id: project_id.into(),
            auth: ToolkitAuth::ServiceAccount(token_source),
            signer,
        })
    }

    /// Client for the Auth emulator.
    pub fn for_emulator(
        endpoint: ServiceEndpoint,
        project_id: impl Into<String>,
        signer: Arc<CustomTokenSigner>,
        timeout: Duration,
    ) -> Result<Self, IdentityToolkitError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            project_id: project_id.into(),
            auth: ToolkitAuth::Emulator,
            signer,
        })
    }

    /// Build a client from service configuration.
    ///
    /// Reads the service account key from `credentials_path`. Against the
    /// emulator the key is optional and the project id is required.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, IdentityToolkitError> {
        let key = config
            .credentials_path
            .as_ref()
            .map(ServiceAccountKey::from_file)
            .transpose()?;

        let project_id = config
            .project_id
            .clone()
            .or_else(|| key.as_ref().map(|k| k.project_id.clone()))
            .ok_or_else(|| {
                IdentityToolkitError::Config("Firebase project id is not configured".to_string())
            })?;

        if config.uses_emulator() {
            let signer = match key {
                Some(ref key) => CustomTokenSigner::from_service_account(key)?,
                None => CustomTokenSigner::with_secret(EMULATOR_SECRET, EMULATOR_ISSUER)?,
            };
            info!("Using Firebase Auth emulator at {}", config.auth_endpoint().base_url);
            return Self::for_emulator(
                config.auth_endpoint(),
                project_id,
                Arc::new(signer),
                config.timeout(),
            );
        }

        let key = key.ok_or_else(|| {
            IdentityToolkitError::Config("Service account credentials are required".to_string())
        })?;
        Self::from_service_account(config.auth_endpoint(), project_id, &key, config.timeout())
    }

    /// The signer used for custom tokens.
    pub fn signer(&self) -> &CustomTokenSigner {
        &self.signer
    }

    fn project_url(&self, operation: &str) -> String {
        self.endpoint
            .url(&format!("/v1/projects/{}/{}", self.project_id, operation))
    }

    async fn bearer_token(&self) -> Result<String, IdentityToolkitError> {
        match self.auth {
            ToolkitAuth::ServiceAccount(ref source) => Ok(source.access_token().await?),
            ToolkitAuth::Emulator => Ok("owner".to_string()),
        }
    }

    async fn post<B, T>(&self, operation: &str, body: &B) -> Result<T, IdentityToolkitError>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let url = self.project_url(operation);
        let token = self.bearer_token().await?;

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!("Identity Toolkit request failed: {}", e);
                IdentityToolkitError::RequestFailed(e)
            })?;

        self.handle_response(response).await
    }

    async fn handle_response<T>(&self, response: reqwest::Response) -> Result<T, IdentityToolkitError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let status = response.status();

        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|body| body.error.message)
                .unwrap_or(text);
            let code = message
                .split(" : ")
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();

            warn!("Identity Toolkit API error ({}): {}", status.as_u16(), message);
            return Err(IdentityToolkitError::ApiError {
                status: status.as_u16(),
                code,
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| IdentityToolkitError::InvalidResponse(e.to_string()))
    }

    /// Look up an account by email.
    #[instrument(skip(self, email))]
    pub async fn lookup_by_email(&self, email: &str) -> Result<Option<UserRecord>, IdentityToolkitError> {
        debug!("Looking up account by email");

        let body = LookupRequest {
            email: vec![email.to_string()],
        };
        let response: LookupResponse = self.post("accounts:lookup", &body).await?;

        response
            .users
            .into_iter()
            .next()
            .map(UserRecord::try_from)
            .transpose()
    }

    /// Create an account.
    #[instrument(skip(self, user))]
    pub async fn create_account(&self, user: NewUser) -> Result<UserRecord, IdentityToolkitError> {
        debug!("Creating account");

        let body = CreateAccountRequest {
            email: &user.email,
            email_verified: user.email_verified,
            display_name: user.display_name.as_deref(),
        };
        let response: CreateAccountResponse = self.post("accounts", &body).await?;

        info!(uid = %response.local_id, "Created account");
        Ok(UserRecord {
            uid: response.local_id,
            email: Some(user.email),
            email_verified: user.email_verified,
            display_name: user.display_name,
            custom_claims: CustomClaims::new(),
        })
    }

    /// Replace the custom claims on an account.
    #[instrument(skip(self, claims))]
    pub async fn update_custom_claims(
        &self,
        uid: &str,
        claims: &CustomClaims,
    ) -> Result<(), IdentityToolkitError> {
        scout_auth::claims::validate_uid(uid)?;
        let custom_attributes = serialize_custom_claims(claims)?;

        let body = UpdateAccountRequest {
            local_id: uid,
            custom_attributes: &custom_attributes,
        };
        let _: UpdateAccountResponse = self.post("accounts:update", &body).await?;

        debug!("Updated custom claims");
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for IdentityToolkitClient {
    async fn get_user_by_email(&self, email: &str) -> AuthResult<Option<UserRecord>> {
        Ok(self.lookup_by_email(email).await?)
    }

    async fn create_user(&self, user: NewUser) -> AuthResult<UserRecord> {
        Ok(self.create_account(user).await?)
    }

    async fn set_custom_user_claims(&self, uid: &str, claims: &CustomClaims) -> AuthResult<()> {
        Ok(self.update_custom_claims(uid, claims).await?)
    }

    async fn create_custom_token(&self, uid: &str, developer_claims: &CustomClaims) -> AuthResult<String> {
        self.signer.create_custom_token(uid, developer_claims)
    }
}

/// Error body returned by Google APIs.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Debug, Serialize)]
struct LookupRequest {
    email: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

/// Account as returned by `accounts:lookup`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    custom_attributes: Option<String>,
}

impl TryFrom<AccountInfo> for UserRecord {
    type Error = IdentityToolkitError;

    fn try_from(info: AccountInfo) -> Result<Self, Self::Error> {
        let custom_claims = match info.custom_attributes.as_deref() {
            Some(raw) if !raw.is_empty() => serde_json::from_str(raw).map_err(|e| {
                IdentityToolkitError::InvalidResponse(format!("customAttributes: {}", e))
            })?,
            _ => CustomClaims::new(),
        };

        Ok(UserRecord {
            uid: info.local_id,
            email: info.email,
            email_verified: info.email_verified,
            display_name: info.display_name,
            custom_claims,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAccountRequest<'a> {
    email: &'a str,
    email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAccountResponse {
    local_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateAccountRequest<'a> {
    local_id: &'a str,
    custom_attributes: &'a str,
}

#[derive(Debug, Deserialize)]
struct UpdateAccountResponse {}
