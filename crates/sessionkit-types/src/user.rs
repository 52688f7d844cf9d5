//! Identity returned by successful authentication flows.

use serde::{Deserialize, Serialize};

/// The OIDC userinfo of the signed-in identity.
///
/// Field names on the wire follow the provider's claim names, which is why
/// some of them are namespaced URIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Stable subject identifier.
    pub sub: String,

    #[serde(rename = "https://authgear.com/claims/user/is_verified", default)]
    pub is_verified: bool,

    #[serde(rename = "https://authgear.com/claims/user/is_anonymous", default)]
    pub is_anonymous: bool,

    #[serde(rename = "https://authgear.com/claims/user/can_reauthenticate", default)]
    pub can_reauthenticate: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl UserInfo {
    /// Creates a verified, non-anonymous identity with only a subject.
    pub fn new(sub: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            is_verified: true,
            is_anonymous: false,
            can_reauthenticate: true,
            email: None,
            phone_number: None,
        }
    }

    /// A human-facing handle for the identity: phone first, then email.
    pub fn display_handle(&self) -> Option<&str> {
        self.phone_number.as_deref().or(self.email.as_deref())
    }
}

/// What a successful authenticate/authorize/reauthenticate/biometric/promote
/// operation hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub user_info: UserInfo,
    /// The opaque OAuth `state` echoed back, if the request carried one.
    pub state: Option<String>,
}
