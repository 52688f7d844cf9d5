//! Options passed to the auth client for each kind of flow.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Interactive flows
// ---------------------------------------------------------------------------

/// Options for an interactive authenticate (authorization-code) flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticateOptions {
    /// Where the provider redirects after authorization.
    pub redirect_uri: String,
    /// OAuth 2.0 `state`, echoed back in [`AuthResult`](crate::AuthResult).
    pub state: Option<String>,
    /// OIDC `login_hint`.
    pub login_hint: Option<String>,
    /// UI locale tags.
    pub ui_locales: Vec<String>,
    /// Initial page ("login" or "signup").
    pub page: Option<String>,
    /// Redirect URI used when the user picks social login. Setting it makes
    /// the client ask the social bridge for an auth request.
    pub social_redirect_uri: Option<String>,
}

impl AuthenticateOptions {
    pub fn new(redirect_uri: impl Into<String>) -> Self {
        Self {
            redirect_uri: redirect_uri.into(),
            ..Self::default()
        }
    }
}

/// Options for re-authentication of the current user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReauthenticateOptions {
    pub redirect_uri: String,
    pub state: Option<String>,
    pub ui_locales: Vec<String>,
    /// OIDC `max_age`. The client treats `None` as 0 (always prompt).
    pub max_age: Option<u32>,
    pub social_redirect_uri: Option<String>,
}

impl ReauthenticateOptions {
    pub fn new(redirect_uri: impl Into<String>) -> Self {
        Self {
            redirect_uri: redirect_uri.into(),
            ..Self::default()
        }
    }
}

/// Options for promoting an anonymous user to a regular one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromoteOptions {
    pub redirect_uri: String,
    pub state: Option<String>,
    pub ui_locales: Vec<String>,
    pub social_redirect_uri: Option<String>,
}

impl PromoteOptions {
    pub fn new(redirect_uri: impl Into<String>) -> Self {
        Self {
            redirect_uri: redirect_uri.into(),
            ..Self::default()
        }
    }
}

/// Options for minting a pre-authenticated URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreAuthenticatedUrlOptions {
    /// Client id of the session that will redeem the URL.
    pub client_id: String,
    /// Where the browser goes once the new session exists.
    pub redirect_uri: String,
    /// Passed through to `redirect_uri` as the `state` query parameter.
    pub state: Option<String>,
}

// ---------------------------------------------------------------------------
// Biometric
// ---------------------------------------------------------------------------

/// Which authenticators may unlock the biometric key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedAuthenticators {
    pub biometric_strong: bool,
    pub device_credential: bool,
}

impl AllowedAuthenticators {
    /// Class 3 biometrics only.
    pub const BIOMETRIC_STRONG: Self = Self {
        biometric_strong: true,
        device_credential: false,
    };

    pub fn is_empty(&self) -> bool {
        !self.biometric_strong && !self.device_credential
    }
}

/// The confirmation prompt shown when a biometric key is created or used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiometricPrompt {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub negative_button_text: String,
    pub allowed_authenticators: AllowedAuthenticators,
    pub require_confirmation: bool,
    /// Whether enrolling a new fingerprint/face invalidates the key.
    pub invalidated_by_enrollment: bool,
}

impl Default for BiometricPrompt {
    fn default() -> Self {
        Self {
            title: "Biometric Authentication".to_string(),
            subtitle: "Biometric authentication".to_string(),
            description: "Use biometric to authenticate".to_string(),
            negative_button_text: "Cancel".to_string(),
            allowed_authenticators: AllowedAuthenticators::BIOMETRIC_STRONG,
            require_confirmation: true,
            invalidated_by_enrollment: true,
        }
    }
}
