//! ID.me identity provider support
//!
//! ID.me answers an attributes request with the verified identity's
//! attributes (email, first and last name, ...) and the groups it has been
//! verified for. This module holds those types and the trait that fetches
//! them.

use crate::error::AuthResult;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Attribute handle holding the email address.
pub const EMAIL_HANDLE: &str = "email";

/// Attribute handle holding the first name.
pub const FIRST_NAME_HANDLE: &str = "fname";

/// Attribute handle holding the last name.
pub const LAST_NAME_HANDLE: &str = "lname";

/// Reads `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A single identity attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdmeAttribute {
    /// Machine name, e.g. `email`
    #[serde(default, deserialize_with = "null_as_default")]
    pub handle: String,

    /// Display name, e.g. `Email`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Attribute value; only string values are read
    #[serde(default)]
    pub value: Option<Value>,
}

impl IdmeAttribute {
    /// Create an attribute.
    pub fn new(handle: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            name: None,
            value: Some(Value::String(value.into())),
        }
    }
}

/// Verification status for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdmeStatus {
    /// Group, e.g. `military`
    #[serde(default, deserialize_with = "null_as_default")]
    pub group: String,

    /// Subgroups within the group, e.g. `Veteran`
    #[serde(default, deserialize_with = "null_as_default")]
    pub subgroups: Vec<String>,

    /// Whether the identity is verified for this group
    #[serde(default, deserialize_with = "null_as_default")]
    pub verified: bool,
}

impl IdmeStatus {
    /// Create a status entry.
    pub fn new(group: impl Into<String>, verified: bool) -> Self {
        Self {
            group: group.into(),
            subgroups: Vec::new(),
            verified,
        }
    }
}

/// Attributes response from ID.me.
///
/// `attributes` stays optional so a response without it can be told apart
/// from one with an empty list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdmeProfile {
    /// Identity attributes
    #[serde(default)]
    pub attributes: Option<Vec<IdmeAttribute>>,

    /// Group verification status; `null` reads as empty
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: Vec<IdmeStatus>,
}

impl IdmeProfile {
    /// Value of the attribute with `handle`, if present and non-empty.
    pub fn attribute(&self, handle: &str) -> Option<&str> {
        self.attributes
            .as_deref()?
            .iter()
            .find(|attr| attr.handle == handle)
            .and_then(|attr| attr.value.as_ref())
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Email address of the identity.
    pub fn email(&self) -> Option<&str> {
        self.attribute(EMAIL_HANDLE)
    }

    /// `"<fname> <lname>"`, trimmed, or `None` when both are missing.
    pub fn display_name(&self) -> Option<String> {
        let name = format!(
            "{} {}",
            self.attribute(FIRST_NAME_HANDLE).unwrap_or_default(),
            self.attribute(LAST_NAME_HANDLE).unwrap_or_default()
        );
        let name = name.trim();

        (!name.is_empty()).then(|| name.to_string())
    }

    /// First verified status entry whose group is one of `groups`.
    ///
    /// Group names compare case-insensitively.
    pub fn verified_group<S: AsRef<str>>(&self, groups: &[S]) -> Option<&IdmeStatus> {
        self.status.iter().find(|status| {
            status.verified
                && groups
                    .iter()
                    .any(|group| group.as_ref().eq_ignore_ascii_case(&status.group))
        })
    }
}

/// Trait for identity provider implementations.
#[async_trait]
pub trait IdentityProviderClient: Send + Sync {
    /// Fetch the verified profile the access token grants access to.
    async fn fetch_profile(&self, access_token: &str) -> AuthResult<IdmeProfile>;
}
