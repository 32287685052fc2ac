//! User directory abstraction
//!
//! Accounts live in the managed auth provider. This module defines the
//! records we read back, the trait the exchange talks to, and an in-memory
//! directory for tests and local development.

use crate::claims::CustomClaims;
use crate::error::AuthResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(feature = "memory")]
use crate::{
    claims::{serialize_custom_claims, validate_uid},
    error::AuthError,
    jwt::CustomTokenSigner,
};
#[cfg(feature = "memory")]
use std::collections::HashMap;
#[cfg(feature = "memory")]
use tokio::sync::RwLock;

/// An account as the auth provider reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Provider-assigned account id
    pub uid: String,

    /// Email address
    #[serde(default)]
    pub email: Option<String>,

    /// Whether the email address is verified
    #[serde(default)]
    pub email_verified: bool,

    /// Display name
    #[serde(default)]
    pub display_name: Option<String>,

    /// Custom claims currently stored on the account
    #[serde(default)]
    pub custom_claims: CustomClaims,
}

/// Properties of an account to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    /// Email address
    pub email: String,

    /// Whether the email address is verified
    pub email_verified: bool,

    /// Display name
    pub display_name: Option<String>,
}

impl NewUser {
    /// A new account with a verified email address.
    pub fn verified(email: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            email: email.into(),
            email_verified: true,
            display_name,
        }
    }
}

/// Trait for user directory implementations.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up an account by email; `None` when no account has it.
    async fn get_user_by_email(&self, email: &str) -> AuthResult<Option<UserRecord>>;

    /// Create an account.
    async fn create_user(&self, user: NewUser) -> AuthResult<UserRecord>;

    /// Replace the custom claims on an account.
    async fn set_custom_user_claims(&self, uid: &str, claims: &CustomClaims) -> AuthResult<()>;

    /// Mint a custom token for an account.
    async fn create_custom_token(&self, uid: &str, developer_claims: &CustomClaims) -> AuthResult<String>;
}

/// In-memory user directory.
///
/// Suitable for tests and local development; nothing survives a restart.
#[cfg(feature = "memory")]
pub struct MemoryUserDirectory {
    /// Accounts by uid
    users: RwLock<HashMap<String, UserRecord>>,
    /// Signs custom tokens
    signer: CustomTokenSigner,
}

#[cfg(feature = "memory")]
impl std::fmt::Debug for MemoryUserDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryUserDirectory")
            .field("signer", &self.signer)
            .finish()
    }
}

#[cfg(feature = "memory")]
impl MemoryUserDirectory {
    /// Create an empty directory.
    pub fn new(signer: CustomTokenSigner) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            signer,
        }
    }

    /// Get an account by uid.
    pub async fn get_user(&self, uid: &str) -> Option<UserRecord> {
        self.users.read().await.get(uid).cloned()
    }

    /// Number of accounts.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Whether the directory holds no accounts.
    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    /// The signer used for custom tokens.
    pub fn signer(&self) -> &CustomTokenSigner {
        &self.signer
    }
}

#[cfg(feature = "memory")]
#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn get_user_by_email(&self, email: &str) -> AuthResult<Option<UserRecord>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|user| {
                user.email
                    .as_deref()
                    .is_some_and(|existing| existing.eq_ignore_ascii_case(email))
            })
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> AuthResult<UserRecord> {
        let mut users = self.users.write().await;

        let exists = users.values().any(|existing| {
            existing
                .email
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case(&user.email))
        });
        if exists {
            return Err(AuthError::Provider {
                code: "EMAIL_EXISTS".to_string(),
                message: format!("An account already exists for {}", user.email),
            });
        }

        let record = UserRecord {
            uid: uuid::Uuid::now_v7().simple().to_string(),
            email: Some(user.email),
            email_verified: user.email_verified,
            display_name: user.display_name,
            custom_claims: CustomClaims::new(),
        };
        users.insert(record.uid.clone(), record.clone());

        Ok(record)
    }

    async fn set_custom_user_claims(&self, uid: &str, claims: &CustomClaims) -> AuthResult<()> {
        validate_uid(uid)?;
        serialize_custom_claims(claims)?;

        let mut users = self.users.write().await;
        let user = users.get_mut(uid).ok_or_else(|| AuthError::Provider {
            code: "USER_NOT_FOUND".to_string(),
            message: format!("No account with uid {}", uid),
        })?;
        user.custom_claims = claims.clone();

        Ok(())
    }

    async fn create_custom_token(&self, uid: &str, developer_claims: &CustomClaims) -> AuthResult<String> {
        self.signer.create_custom_token(uid, developer_claims)
    }
}
