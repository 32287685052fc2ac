//! Custom token signing and validation
//!
//! This module signs Firebase custom tokens and the OAuth2 JWT-bearer
//! assertions a service account trades for access tokens. It uses the
//! jsonwebtoken crate; RS256 is what Firebase accepts, HS256 is kept for
//! local emulator and test setups.

use crate::claims::{
    validate_claims, validate_uid, CustomClaims, CustomTokenClaims, FIREBASE_AUDIENCE,
};
use crate::error::{AuthError, AuthResult};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[cfg(feature = "jwt")]
use jsonwebtoken::{
    decode, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation,
};

/// Longest lifetime Firebase accepts for a custom token.
pub fn max_custom_token_duration() -> Duration {
    Duration::hours(1)
}

/// Google service account key, as downloaded from the cloud console.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Key type, always `service_account`
    #[serde(rename = "type")]
    pub key_type: String,

    /// Project the service account belongs to
    pub project_id: String,

    /// Identifier of the private key
    pub private_key_id: String,

    /// PKCS#8 private key (PEM)
    pub private_key: String,

    /// Service account email; issuer of everything we sign
    pub client_email: String,

    /// OAuth2 token endpoint
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"[REDACTED]")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    /// Parse a key from its JSON form.
    pub fn from_json(json: &str) -> AuthResult<Self> {
        let key: Self = serde_json::from_str(json)
            .map_err(|e| AuthError::ConfigError(format!("Invalid service account key: {}", e)))?;

        if key.key_type != "service_account" {
            return Err(AuthError::ConfigError(format!(
                "Unsupported credential type: {}",
                key.key_type
            )));
        }
        Ok(key)
    }

    /// Read and parse a key file.
    pub fn from_file(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            AuthError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }
}

/// Signer configuration.
#[derive(Debug, Clone)]
pub struct SignerConfig {
    /// Secret key for HS256
    pub secret: Option<String>,

    /// Private key (PEM) for RS256
    pub private_key: Option<String>,

    /// Public key (PEM) for RS256; only needed to verify tokens
    pub public_key: Option<String>,

    /// Algorithm to use
    pub algorithm: JwtAlgorithm,

    /// Token issuer (service account email)
    pub issuer: String,

    /// Token audience
    pub audience: String,

    /// Custom token lifetime
    pub token_duration: Duration,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            secret: None,
            private_key: None,
            public_key: None,
            algorithm: JwtAlgorithm::RS256,
            issuer: "firebase-adminsdk@localhost".to_string(),
            audience: FIREBASE_AUDIENCE.to_string(),
            token_duration: max_custom_token_duration(),
        }
    }
}

impl SignerConfig {
    /// Configuration for signing as the given service account.
    pub fn from_service_account(key: &ServiceAccountKey) -> Self {
        Self {
            private_key: Some(key.private_key.clone()),
            issuer: key.client_email.clone(),
            ..Default::default()
        }
    }
}

/// Supported JWT algorithms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum JwtAlgorithm {
    /// HMAC using SHA-256
    HS256,
    /// RSASSA-PKCS1-v1_5 using SHA-256
    RS256,
}

#[cfg(feature = "jwt")]
impl From<JwtAlgorithm> for Algorithm {
    fn from(alg: JwtAlgorithm) -> Self {
        match alg {
            JwtAlgorithm::HS256 => Algorithm::HS256,
            JwtAlgorithm::RS256 => Algorithm::RS256,
        }
    }
}

/// OAuth2 JWT-bearer assertion payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Service account email
    pub iss: String,

    /// Space-separated scopes requested
    pub scope: String,

    /// Token endpoint
    pub aud: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Signs Firebase custom tokens and service account assertions.
pub struct CustomTokenSigner {
    config: SignerConfig,
    #[cfg(feature = "jwt")]
    encoding_key: EncodingKey,
    #[cfg(feature = "jwt")]
    decoding_key: Option<DecodingKey>,
}

impl std::fmt::Debug for CustomTokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomTokenSigner")
            .field("algorithm", &self.config.algorithm)
            .field("issuer", &self.config.issuer)
            .field("audience", &self.config.audience)
            .field("token_duration", &self.config.token_duration)
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

impl CustomTokenSigner {
    /// Create a signer with the given configuration.
    #[cfg(feature = "jwt")]
    pub fn new(config: SignerConfig) -> AuthResult<Self> {
        if config.token_duration <= Duration::zero()
            || config.token_duration > max_custom_token_duration()
        {
            return Err(AuthError::ConfigError(
                "Custom token lifetime must be between 0 and 1 hour".to_string(),
            ));
        }

        let encoding_key = Self::create_encoding_key(&config)?;
        let decoding_key = Self::create_decoding_key(&config)?;

        Ok(Self {
            config,
            encoding_key,
            decoding_key,
        })
    }

    /// Create a signer for a service account key.
    #[cfg(feature = "jwt")]
    pub fn from_service_account(key: &ServiceAccountKey) -> AuthResult<Self> {
        Self::new(SignerConfig::from_service_account(key))
    }

    /// Create with a shared secret (HS256).
    ///
    /// Firebase itself rejects these tokens; the Auth emulator and tests
    /// accept them.
    #[cfg(feature = "jwt")]
    pub fn with_secret(secret: impl Into<String>, issuer: impl Into<String>) -> AuthResult<Self> {
        Self::new(SignerConfig {
            secret: Some(secret.into()),
            algorithm: JwtAlgorithm::HS256,
            issuer: issuer.into(),
            ..Default::default()
        })
    }

    #[cfg(feature = "jwt")]
    fn create_encoding_key(config: &SignerConfig) -> AuthResult<EncodingKey> {
        match config.algorithm {
            JwtAlgorithm::HS256 => {
                let secret = config
                    .secret
                    .as_ref()
                    .ok_or_else(|| AuthError::ConfigError("Secret required for HMAC".to_string()))?;
                Ok(EncodingKey::from_secret(secret.as_bytes()))
            }
            JwtAlgorithm::RS256 => {
                let key = config
                    .private_key
                    .as_ref()
                    .ok_or_else(|| AuthError::ConfigError("Private key required for RSA".to_string()))?;
                EncodingKey::from_rsa_pem(key.as_bytes())
                    .map_err(|e| AuthError::ConfigError(format!("Invalid RSA private key: {}", e)))
            }
        }
    }

    #[cfg(feature = "jwt")]
    fn create_decoding_key(config: &SignerConfig) -> AuthResult<Option<DecodingKey>> {
        match config.algorithm {
            JwtAlgorithm::HS256 => Ok(config
                .secret
                .as_ref()
                .map(|secret| DecodingKey::from_secret(secret.as_bytes()))),
            JwtAlgorithm::RS256 => config
                .public_key
                .as_ref()
                .map(|key| {
                    DecodingKey::from_rsa_pem(key.as_bytes()).map_err(|e| {
                        AuthError::ConfigError(format!("Invalid RSA public key: {}", e))
                    })
                })
                .transpose(),
        }
    }

    /// Mint a custom token that signs the client in as `uid`.
    ///
    /// `developer_claims` end up in the ID token Firebase hands back.
    #[cfg(feature = "jwt")]
    pub fn create_custom_token(&self, uid: &str, developer_claims: &CustomClaims) -> AuthResult<String> {
        validate_uid(uid)?;
        validate_claims(developer_claims)?;

        let claims = CustomTokenClaims::new(
            &self.config.issuer,
            &self.config.audience,
            uid,
            self.config.token_duration,
        )
        .with_claims(developer_claims.clone());

        self.encode_custom_token(&claims)
    }

    /// Encode an already-built custom token payload.
    #[cfg(feature = "jwt")]
    pub fn encode_custom_token(&self, claims: &CustomTokenClaims) -> AuthResult<String> {
        let header = Header::new(self.config.algorithm.into());
        encode(&header, claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Token encoding failed: {}", e)))
    }

    /// Validate and decode a custom token minted by this signer.
    #[cfg(feature = "jwt")]
    pub fn verify_custom_token(&self, token: &str) -> AuthResult<CustomTokenClaims> {
        let decoding_key = self.decoding_key.as_ref().ok_or_else(|| {
            AuthError::ConfigError("Verification key not configured".to_string())
        })?;

        let mut validation = Validation::new(self.config.algorithm.into());
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "aud"]);

        let token_data: TokenData<CustomTokenClaims> = decode(token, decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    AuthError::InvalidToken("Malformed token".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AuthError::InvalidToken("Invalid signature".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                    AuthError::InvalidToken("Invalid issuer".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidAudience => {
                    AuthError::InvalidToken("Invalid audience".to_string())
                }
                _ => AuthError::InvalidToken(e.to_string()),
            })?;

        Ok(token_data.claims)
    }

    /// Sign a JWT-bearer grant assertion for `scopes` against `token_uri`.
    #[cfg(feature = "jwt")]
    pub fn create_assertion(&self, scopes: &[&str], token_uri: &str) -> AuthResult<String> {
        let now = Utc::now();
        let claims = AssertionClaims {
            iss: self.config.issuer.clone(),
            scope: scopes.join(" "),
            aud: token_uri.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };

        let header = Header::new(self.config.algorithm.into());
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Assertion encoding failed: {}", e)))
    }

    /// Get the configuration.
    pub fn config(&self) -> &SignerConfig {
        &self.config
    }
}
