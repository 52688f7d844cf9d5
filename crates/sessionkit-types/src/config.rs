//! Persisted session configuration.

use serde::{Deserialize, Serialize};

use crate::TypesError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Everything needed to build an auth client for one profile.
///
/// Written to the config store on every configure and read back when an
/// orchestrator starts, so the last-used settings survive a restart.
/// Once a client has been built from a `Configuration`, the client keeps
/// its own copy; changing it means configuring again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub client_id: String,
    pub endpoint: String,
    /// Share the session with the system browser.
    pub sso_enabled: bool,
    /// Present authorization in the alternate UI (embedded web view)
    /// instead of the default browser tab.
    pub use_alternate_ui: bool,
    /// Endpoint used when this app initiates app2app; empty disables it.
    pub app2app_endpoint: String,
    /// Allow minting pre-authenticated URLs from this session.
    pub pre_auth_enabled: bool,
    /// Default target client for pre-authenticated URLs; empty means "self".
    pub pre_auth_client_id: String,
    /// Default target redirect for pre-authenticated URLs; empty means "self".
    pub pre_auth_redirect_uri: String,
    /// Keep tokens in memory only.
    pub transient_session: bool,
}

impl Configuration {
    /// Creates a configuration with the two required fields set.
    pub fn new(client_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Checks the fields a client cannot be built without.
    ///
    /// # Errors
    /// [`TypesError::InvalidConfiguration`] when `client_id` or `endpoint`
    /// is blank, or `endpoint` is not an absolute URL.
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.client_id.trim().is_empty() {
            return Err(TypesError::InvalidConfiguration(
                "client_id must not be empty".into(),
            ));
        }
        if self.endpoint.trim().is_empty() {
            return Err(TypesError::InvalidConfiguration(
                "endpoint must not be empty".into(),
            ));
        }
        url::Url::parse(&self.endpoint).map_err(|e| {
            TypesError::InvalidConfiguration(format!("endpoint: {e}"))
        })?;
        Ok(())
    }

    pub fn token_storage(&self) -> TokenStorageKind {
        if self.transient_session {
            TokenStorageKind::Transient
        } else {
            TokenStorageKind::Persistent
        }
    }

    pub fn ui_variant(&self) -> UiVariant {
        if self.use_alternate_ui {
            UiVariant::WebView
        } else {
            UiVariant::BrowserTab
        }
    }

    /// The pre-auth target client, or `None` when the field is blank.
    pub fn pre_auth_target_client_id(&self) -> Option<&str> {
        non_blank(&self.pre_auth_client_id)
    }

    /// The pre-auth target redirect, or `None` when the field is blank.
    pub fn pre_auth_target_redirect_uri(&self) -> Option<&str> {
        non_blank(&self.pre_auth_redirect_uri)
    }

    pub fn app2app_endpoint(&self) -> Option<&str> {
        non_blank(&self.app2app_endpoint)
    }

    /// The account settings page, `/settings` at the endpoint's origin.
    ///
    /// # Errors
    /// [`TypesError::InvalidConfiguration`] when `endpoint` is not an
    /// absolute URL.
    pub fn settings_url(&self) -> Result<url::Url, TypesError> {
        url::Url::parse(self.endpoint.trim())
            .and_then(|base| base.join("/settings"))
            .map_err(|e| TypesError::InvalidConfiguration(format!("endpoint: {e}")))
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

// ---------------------------------------------------------------------------
// Derived client settings
// ---------------------------------------------------------------------------

/// Where the client keeps its refresh token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStorageKind {
    /// Survives process restarts.
    Persistent,
    /// In memory only; lost when the process exits.
    Transient,
}

/// How the authorization page is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiVariant {
    BrowserTab,
    WebView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_url_replaces_endpoint_path() {
        let cfg = Configuration::new("c1", "https://auth.example/tenant/");
        assert_eq!(
            cfg.settings_url().unwrap().as_str(),
            "https://auth.example/settings"
        );
        assert!(Configuration::new("c1", "not a url").settings_url().is_err());
    }

    #[test]
    fn test_validate_accepts_minimal_configuration() {
        let cfg = Configuration::new("c1", "https://e");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_client_id() {
        let cfg = Configuration::new("  ", "https://e");
        assert!(matches!(
            cfg.validate(),
            Err(TypesError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_relative_endpoint() {
        let cfg = Configuration::new("c1", "not a url");
        assert!(matches!(
            cfg.validate(),
            Err(TypesError::InvalidConfiguration(msg)) if msg.starts_with("endpoint")
        ));
    }

    #[test]
    fn test_token_storage_follows_transient_flag() {
        let mut cfg = Configuration::new("c1", "https://e");
        assert_eq!(cfg.token_storage(), TokenStorageKind::Persistent);
        cfg.transient_session = true;
        assert_eq!(cfg.token_storage(), TokenStorageKind::Transient);
    }

    #[test]
    fn test_ui_variant_follows_alternate_flag() {
        let mut cfg = Configuration::new("c1", "https://e");
        assert_eq!(cfg.ui_variant(), UiVariant::BrowserTab);
        cfg.use_alternate_ui = true;
        assert_eq!(cfg.ui_variant(), UiVariant::WebView);
    }

    #[test]
    fn test_pre_auth_targets_treat_blank_as_none() {
        let mut cfg = Configuration::new("c1", "https://e");
        cfg.pre_auth_client_id = "   ".into();
        assert_eq!(cfg.pre_auth_target_client_id(), None);
        cfg.pre_auth_redirect_uri = "https://web.example/cb".into();
        assert_eq!(
            cfg.pre_auth_target_redirect_uri(),
            Some("https://web.example/cb")
        );
    }
}
