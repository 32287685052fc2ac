//! Claims attached to Scout accounts and custom tokens
//!
//! Two kinds of claims live here:
//! - [`VerificationClaims`]: the custom claims stored on a Firebase account
//!   once ID.me has confirmed the user's status.
//! - [`CustomTokenClaims`]: the JWT payload of a Firebase custom token.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{AuthError, AuthResult};

/// Audience Firebase expects on custom tokens.
pub const FIREBASE_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

/// Claim names Firebase refuses as developer or custom claims.
pub const RESERVED_CLAIMS: &[&str] = &[
    "acr", "amr", "at_hash", "aud", "auth_time", "azp", "cnf", "c_hash", "exp", "firebase", "iat",
    "iss", "jti", "nbf", "nonce", "sub",
];

/// Largest serialized custom-claims payload Firebase stores on an account.
pub const MAX_CUSTOM_CLAIMS_BYTES: usize = 1000;

/// Longest uid Firebase accepts.
pub const MAX_UID_LENGTH: usize = 128;

/// Free-form claims map, as stored on accounts and embedded in tokens.
pub type CustomClaims = HashMap<String, serde_json::Value>;

/// Verification claims stored on an account after a successful ID.me check.
///
/// Downstream security rules read these, so the wire names are fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationClaims {
    /// Whether ID.me verified the identity
    pub idme_verified: bool,

    /// Verified ID.me group, e.g. `military`
    pub military_status: String,
}

impl VerificationClaims {
    /// Claims for an identity ID.me verified in `group`.
    pub fn verified(group: impl Into<String>) -> Self {
        Self {
            idme_verified: true,
            military_status: group.into(),
        }
    }

    /// Convert to a claims map.
    pub fn to_claims(&self) -> CustomClaims {
        let mut claims = CustomClaims::new();
        claims.insert(
            "idmeVerified".to_string(),
            serde_json::Value::Bool(self.idme_verified),
        );
        claims.insert(
            "militaryStatus".to_string(),
            serde_json::Value::String(self.military_status.clone()),
        );
        claims
    }

    /// Read verification claims back out of a claims map.
    pub fn from_claims(claims: &CustomClaims) -> Option<Self> {
        let value = serde_json::to_value(claims).ok()?;
        serde_json::from_value(value).ok()
    }
}

/// Reject claims Firebase would refuse.
pub fn validate_claims(claims: &CustomClaims) -> AuthResult<()> {
    if let Some(reserved) = claims
        .keys()
        .find(|key| RESERVED_CLAIMS.contains(&key.as_str()))
    {
        return Err(AuthError::InvalidClaims(format!(
            "claim \"{}\" is reserved",
            reserved
        )));
    }
    Ok(())
}

/// Reject claims that cannot be stored on an account.
///
/// Returns the serialized payload, which is what the user directory stores.
pub fn serialize_custom_claims(claims: &CustomClaims) -> AuthResult<String> {
    validate_claims(claims)?;

    let payload = serde_json::to_string(claims)
        .map_err(|e| AuthError::InvalidClaims(e.to_string()))?;
    if payload.len() > MAX_CUSTOM_CLAIMS_BYTES {
        return Err(AuthError::InvalidClaims(format!(
            "custom claims payload must not exceed {} bytes",
            MAX_CUSTOM_CLAIMS_BYTES
        )));
    }
    Ok(payload)
}

/// Reject uids Firebase would refuse.
pub fn validate_uid(uid: &str) -> AuthResult<()> {
    if uid.is_empty() {
        return Err(AuthError::InvalidUid("uid must not be empty".to_string()));
    }
    if uid.chars().count() > MAX_UID_LENGTH {
        return Err(AuthError::InvalidUid(format!(
            "uid must not exceed {} characters",
            MAX_UID_LENGTH
        )));
    }
    Ok(())
}

/// Payload of a Firebase custom token.
///
/// The client exchanges this token with Firebase Auth for an ID token and
/// refresh token; `claims` surface in the resulting ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomTokenClaims {
    /// Issuer (service account email)
    pub iss: String,

    /// Subject (service account email)
    pub sub: String,

    /// Audience (Identity Toolkit)
    pub aud: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Account the token signs in as
    pub uid: String,

    /// Developer claims
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub claims: CustomClaims,
}

impl CustomTokenClaims {
    /// Build the payload for `uid`, valid for `duration` from now.
    pub fn new(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        uid: impl Into<String>,
        duration: Duration,
    ) -> Self {
        let issuer = issuer.into();
        let now = Utc::now();

        Self {
            sub: issuer.clone(),
            iss: issuer,
            aud: audience.into(),
            iat: now.timestamp(),
            exp: (now + duration).timestamp(),
            uid: uid.into(),
            claims: CustomClaims::new(),
        }
    }

    /// Attach developer claims.
    pub fn with_claims(mut self, claims: CustomClaims) -> Self {
        self.claims = claims;
        self
    }

    /// Check if the token is expired.
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Verification claims carried by the token, if any.
    pub fn verification(&self) -> Option<VerificationClaims> {
        VerificationClaims::from_claims(&self.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verification_claims_wire_names() {
        let claims = VerificationClaims::verified("military");
        let value = serde_json::to_value(&claims).unwrap();

        assert_eq!(
            value,
            json!({ "idmeVerified": true, "militaryStatus": "military" })
        );
        assert_eq!(serde_json::to_value(claims.to_claims()).unwrap(), value);
    }

    #[test]
    fn test_verification_claims_from_map() {
        let map = VerificationClaims::verified("military").to_claims();
        let parsed = VerificationClaims::from_claims(&map).unwrap();
        assert!(parsed.idme_verified);
        assert_eq!(parsed.military_status, "military");

        assert!(VerificationClaims::from_claims(&CustomClaims::new()).is_none());
    }

    #[test]
    fn test_reserved_claims_rejected() {
        let mut claims = VerificationClaims::verified("military").to_claims();
        assert!(validate_claims(&claims).is_ok());

        claims.insert("sub".to_string(), json!("someone-else"));
        assert!(matches!(
            validate_claims(&claims),
            Err(AuthError::InvalidClaims(_))
        ));
    }

    #[test]
    fn test_oversized_custom_claims_rejected() {
        let mut claims = CustomClaims::new();
        claims.insert("blob".to_string(), json!("x".repeat(MAX_CUSTOM_CLAIMS_BYTES)));

        assert!(matches!(
            serialize_custom_claims(&claims),
            Err(AuthError::InvalidClaims(_))
        ));
    }

    #[test]
    fn test_uid_validation() {
        assert!(validate_uid("abc123").is_ok());
        assert!(validate_uid("").is_err());
        assert!(validate_uid(&"u".repeat(MAX_UID_LENGTH)).is_ok());
        assert!(validate_uid(&"u".repeat(MAX_UID_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_custom_token_claims_creation() {
        let claims = CustomTokenClaims::new(
            "svc@scout.iam.gserviceaccount.com",
            FIREBASE_AUDIENCE,
            "uid-1",
            Duration::hours(1),
        );

        assert_eq!(claims.iss, claims.sub);
        assert_eq!(claims.exp - claims.iat, 3600);
        assert!(!claims.is_expired());
        assert!(claims.verification().is_none());

        let serialized = serde_json::to_value(&claims).unwrap();
        assert!(serialized.get("claims").is_none());
    }
}
