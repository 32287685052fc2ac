//! ID.me to Firebase token exchange.
//!
//! [`TokenExchange::verify_and_issue_token`] runs the whole exchange for one
//! request:
//!
//! 1. reject a missing ID.me token
//! 2. fetch attributes and group status from ID.me
//! 3. require an attributes list and an email address
//! 4. require a verified status in a recognized group
//! 5. find the Firebase account by email, creating it when there is none
//! 6. overwrite the account's verification claims
//! 7. mint a custom token for the account
//!
//! Each step waits on the previous one. Nothing is retried and nothing is
//! written before step 5, so a failure leaves no partial state behind.

use crate::error::{CallableError, CallableResult};
use scout_auth::{
    IdentityProviderClient, IdmeProfile, NewUser, UserDirectory, UserRecord, VerificationClaims,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn, Span};

/// Group recognized when none are configured.
pub const DEFAULT_RECOGNIZED_GROUP: &str = "military";

/// Which ID.me verifications unlock the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationPolicy {
    /// ID.me groups that count, compared case-insensitively
    pub recognized_groups: Vec<String>,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            recognized_groups: vec![DEFAULT_RECOGNIZED_GROUP.to_string()],
        }
    }
}

impl VerificationPolicy {
    /// Policy accepting the given groups.
    pub fn new<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            recognized_groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    /// Policy from configured group names, trimmed with blanks dropped.
    ///
    /// `None` when no group is left.
    pub fn from_configured<I, S>(groups: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let recognized_groups: Vec<String> = groups
            .into_iter()
            .map(|group| group.as_ref().trim().to_string())
            .filter(|group| !group.is_empty())
            .collect();

        (!recognized_groups.is_empty()).then_some(Self { recognized_groups })
    }
}

/// Callable input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeRequest {
    /// ID.me access token
    #[serde(rename = "idmeToken", default)]
    pub idme_token: Option<String>,
}

impl ExchangeRequest {
    /// Request carrying `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            idme_token: Some(token.into()),
        }
    }
}

/// Callable output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeResponse {
    /// Firebase custom token
    #[serde(rename = "customToken")]
    pub custom_token: String,
}

/// The exchange, with its collaborators injected.
#[derive(Clone)]
pub struct TokenExchange {
    identity: Arc<dyn IdentityProviderClient>,
    users: Arc<dyn UserDirectory>,
    policy: VerificationPolicy,
}

impl std::fmt::Debug for TokenExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenExchange")
            .field("policy", &self.policy)
            .finish()
    }
}

impl TokenExchange {
    /// Create an exchange.
    pub fn new(
        identity: Arc<dyn IdentityProviderClient>,
        users: Arc<dyn UserDirectory>,
        policy: VerificationPolicy,
    ) -> Self {
        Self {
            identity,
            users,
            policy,
        }
    }

    /// The verification policy in force.
    pub fn policy(&self) -> &VerificationPolicy {
        &self.policy
    }

    /// Exchange an ID.me token for a Firebase custom token.
    #[instrument(skip_all, fields(request_id = %uuid::Uuid::now_v7(), uid = tracing::field::Empty))]
    pub async fn verify_and_issue_token(
        &self,
        request: ExchangeRequest,
    ) -> CallableResult<ExchangeResponse> {
        let token = match request.idme_token.as_deref() {
            Some(token) if !token.trim().is_empty() => token,
            _ => {
                warn!("ID.me token is missing");
                return Err(CallableError::invalid_argument("ID.me token is required"));
            }
        };

        let profile = self.identity.fetch_profile(token).await.map_err(|e| {
            error!(
                code = e.error_code(),
                upstream_status = ?e.upstream_status(),
                "Fetching ID.me attributes failed: {}",
                e
            );
            CallableError::from(e)
        })?;

        let (email, claims) = self.check_profile(&profile)?;

        let user = self.find_or_create_user(email, &profile).await?;
        Span::current().record("uid", user.uid.as_str());

        let claims = claims.to_claims();
        self.users
            .set_custom_user_claims(&user.uid, &claims)
            .await
            .map_err(|e| {
                error!(code = e.error_code(), "Setting custom claims failed: {}", e);
                CallableError::from(e)
            })?;

        let custom_token = self
            .users
            .create_custom_token(&user.uid, &claims)
            .await
            .map_err(|e| {
                error!(code = e.error_code(), "Creating custom token failed: {}", e);
                CallableError::from(e)
            })?;

        info!("Created custom token");
        Ok(ExchangeResponse { custom_token })
    }

    /// Pull the email and verification claims out of an ID.me profile.
    fn check_profile<'a>(
        &self,
        profile: &'a IdmeProfile,
    ) -> CallableResult<(&'a str, VerificationClaims)> {
        if profile.attributes.is_none() {
            error!("Invalid user data returned from ID.me: no attributes");
            return Err(CallableError::internal(
                "Invalid user data returned from ID.me",
            ));
        }

        let email = profile.email().ok_or_else(|| {
            error!("No email found in ID.me response");
            CallableError::internal("No email found in ID.me response")
        })?;
        debug!(email, "Found user email");

        let status = profile
            .verified_group(self.policy.recognized_groups.as_slice())
            .ok_or_else(|| {
                let groups: Vec<_> = profile
                    .status
                    .iter()
                    .map(|status| (status.group.as_str(), status.verified))
                    .collect();
                warn!(?groups, "ID.me identity is not verified for a recognized group");
                CallableError::permission_denied(
                    "ID.me identity is not verified for a recognized group",
                )
            })?;

        Ok((email, VerificationClaims::verified(status.group.to_lowercase())))
    }

    async fn find_or_create_user(
        &self,
        email: &str,
        profile: &IdmeProfile,
    ) -> CallableResult<UserRecord> {
        let existing = self.users.get_user_by_email(email).await.map_err(|e| {
            error!(code = e.error_code(), "Looking up Firebase user failed: {}", e);
            CallableError::from(e)
        })?;

        if let Some(user) = existing {
            info!(uid = %user.uid, "Found existing Firebase user");
            return Ok(user);
        }

        let user = self
            .users
            .create_user(NewUser::verified(email, profile.display_name()))
            .await
            .map_err(|e| {
                error!(code = e.error_code(), "Creating Firebase user failed: {}", e);
                CallableError::from(e)
            })?;

        info!(uid = %user.uid, "Created new Firebase user");
        Ok(user)
    }
}
