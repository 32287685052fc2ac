//! Service configuration for the outbound clients.
//!
//! Provides the ID.me and Firebase Auth endpoints, service account location
//! and timeout settings. Configuration is loaded from environment variables
//! with defaults pointing at the production services.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required environment variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Configuration for all outbound services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// ID.me API.
    pub idme: ServiceEndpoint,

    /// Firebase Auth (Identity Toolkit) API.
    pub identity_toolkit: ServiceEndpoint,

    /// Firebase project id; falls back to the service account's project.
    pub project_id: Option<String>,

    /// Path to the service account key file.
    pub credentials_path: Option<PathBuf>,

    /// Firebase Auth emulator `host:port`, when running against it.
    pub emulator_host: Option<String>,

    /// Default request timeout in seconds.
    pub default_timeout_secs: u64,
}

impl Default for ServiceConfig {
    /// Returns configuration pointing at the production services.
    fn default() -> Self {
        Self {
            idme: ServiceEndpoint {
                base_url: "https://api.id.me".to_string(),
            },
            identity_toolkit: ServiceEndpoint {
                base_url: "https://identitytoolkit.googleapis.com".to_string(),
            },
            project_id: None,
            credentials_path: None,
            emulator_host: None,
            default_timeout_secs: 30,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `IDME_API_URL`: ID.me API URL (default: https://api.id.me)
    /// - `IDENTITY_TOOLKIT_URL`: Firebase Auth API URL (default: https://identitytoolkit.googleapis.com)
    /// - `FIREBASE_PROJECT_ID`: Firebase project id (`GOOGLE_CLOUD_PROJECT` also accepted)
    /// - `GOOGLE_APPLICATION_CREDENTIALS`: service account key file
    /// - `FIREBASE_AUTH_EMULATOR_HOST`: Auth emulator `host:port`
    /// - `SERVICE_TIMEOUT_SECS`: Request timeout in seconds (default: 30)
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        let non_empty = |key: &str| var(key).filter(|value| !value.trim().is_empty());

        Self {
            idme: ServiceEndpoint {
                base_url: non_empty("IDME_API_URL").unwrap_or(default.idme.base_url),
            },
            identity_toolkit: ServiceEndpoint {
                base_url: non_empty("IDENTITY_TOOLKIT_URL")
                    .unwrap_or(default.identity_toolkit.base_url),
            },
            project_id: non_empty("FIREBASE_PROJECT_ID").or_else(|| non_empty("GOOGLE_CLOUD_PROJECT")),
            credentials_path: non_empty("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
            emulator_host: non_empty("FIREBASE_AUTH_EMULATOR_HOST"),
            default_timeout_secs: non_empty("SERVICE_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.default_timeout_secs),
        }
    }

    /// Get the default request timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    /// Whether Firebase Auth calls go to the local emulator.
    pub fn uses_emulator(&self) -> bool {
        self.emulator_host.is_some()
    }

    /// Endpoint Firebase Auth calls go to, honouring the emulator.
    pub fn auth_endpoint(&self) -> ServiceEndpoint {
        match self.emulator_host {
            Some(ref host) => ServiceEndpoint {
                base_url: format!("http://{}/identitytoolkit.googleapis.com", host),
            },
            None => self.identity_toolkit.clone(),
        }
    }

    /// Validate that the configuration can reach the real Firebase project.
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        if self.emulator_host.is_some() {
            return Err(ConfigError::InvalidValue {
                key: "FIREBASE_AUTH_EMULATOR_HOST".to_string(),
                message: "must not be set in production".to_string(),
            });
        }
        if self.credentials_path.is_none() {
            return Err(ConfigError::MissingEnvVar(
                "GOOGLE_APPLICATION_CREDENTIALS".to_string(),
            ));
        }
        if self.default_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SERVICE_TIMEOUT_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration for a single service endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    /// Base URL for the service (e.g., "https://api.id.me").
    pub base_url: String,
}

impl ServiceEndpoint {
    /// Endpoint at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Build a full URL by appending a path to the base URL.
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }
}
