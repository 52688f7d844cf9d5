//! Pre-authenticated URL: sign another client in without a login page.
//!
//! The primary session mints a short-lived URL for a target client. The
//! URL is opened in the authorization surface, which gives the browser a
//! session for the target. What happens next depends on the redirect:
//!
//! ```text
//!   target redirect ≠ primary redirect  ──→  hand-off: the URL goes to
//!                                             another app; done once opened
//!   otherwise                           ──→  build an ephemeral client for
//!                                             the target, configure it, and
//!                                             authenticate it interactively
//! ```
//!
//! The ephemeral client keeps its tokens in memory and its hooks go
//! nowhere, so the primary session's state and tokens are never touched.
//! A failure of the secondary sign-in is logged and swallowed.

use std::sync::Arc;

use rand::Rng;
use sessionkit_client::{
    AuthClient, AuthClientFactory, ClientError, ClientHooks, ClientSettings, Platform,
};
use sessionkit_types::{AuthenticateOptions, Configuration, PreAuthenticatedUrlOptions};
use tracing::{info, warn};
use url::Url;

/// Resolved target of a pre-authenticated URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreAuthTarget {
    pub client_id: String,
    pub redirect_uri: String,
}

impl PreAuthTarget {
    /// Fills each side from, in order: the explicit argument, the
    /// configured default, the primary session's own value.
    pub fn resolve(
        client_id: Option<String>,
        redirect_uri: Option<String>,
        config: &Configuration,
        primary_redirect_uri: &str,
    ) -> Self {
        let client_id = client_id
            .filter(|s| !s.trim().is_empty())
            .or_else(|| config.pre_auth_target_client_id().map(str::to_string))
            .unwrap_or_else(|| config.client_id.clone());
        let redirect_uri = redirect_uri
            .filter(|s| !s.trim().is_empty())
            .or_else(|| config.pre_auth_target_redirect_uri().map(str::to_string))
            .unwrap_or_else(|| primary_redirect_uri.to_string());
        Self {
            client_id,
            redirect_uri,
        }
    }

    /// Whether the URL is handed to another app instead of being redeemed
    /// here.
    pub fn is_handoff(&self, primary_redirect_uri: &str) -> bool {
        self.redirect_uri != primary_redirect_uri
    }
}

/// How an issued URL ended up being used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreAuthOutcome {
    /// Opened for another app to pick up.
    HandedOff { url: Url },
    /// The ephemeral client for `client_id` signed in.
    SecondaryAuthenticated { client_id: String, sub: String },
    /// The ephemeral sign-in failed; the reason was logged.
    SecondaryFailed { client_id: String, reason: String },
}

#[derive(Debug)]
pub struct PreAuthenticatedUrlController<F, P> {
    factory: Arc<F>,
    platform: Arc<P>,
}

impl<F, P> Clone for PreAuthenticatedUrlController<F, P> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            platform: Arc::clone(&self.platform),
        }
    }
}

impl<F: AuthClientFactory, P: Platform> PreAuthenticatedUrlController<F, P> {
    pub fn new(factory: Arc<F>, platform: Arc<P>) -> Self {
        Self { factory, platform }
    }

    /// Mints a URL from `primary` for `target` and redeems it.
    ///
    /// # Errors
    /// Minting or opening the URL failed. Secondary sign-in failures are
    /// not errors; see [`PreAuthOutcome::SecondaryFailed`].
    pub async fn issue_and_redeem(
        self,
        primary: Arc<F::Client>,
        primary_settings: ClientSettings,
        primary_redirect_uri: String,
        target: PreAuthTarget,
    ) -> Result<PreAuthOutcome, ClientError> {
        let options = PreAuthenticatedUrlOptions {
            client_id: target.client_id.clone(),
            redirect_uri: target.redirect_uri.clone(),
            state: Some(generate_state()),
        };
        let url = primary.make_pre_authenticated_url(options).await?;
        info!(target_client_id = %target.client_id, "pre-authenticated url issued");

        self.platform
            .open_authorization_url(url.clone(), target.redirect_uri.clone())
            .await?;

        if target.is_handoff(&primary_redirect_uri) {
            info!(redirect_uri = %target.redirect_uri, "pre-authenticated url handed off");
            return Ok(PreAuthOutcome::HandedOff { url });
        }

        let client_id = target.client_id.clone();
        match self.redeem(&primary_settings, target).await {
            Ok(sub) => {
                info!(%client_id, %sub, "secondary client authenticated");
                Ok(PreAuthOutcome::SecondaryAuthenticated { client_id, sub })
            }
            Err(e) => {
                warn!(%client_id, error = %e, "secondary authentication failed");
                Ok(PreAuthOutcome::SecondaryFailed {
                    client_id,
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn redeem(
        &self,
        primary_settings: &ClientSettings,
        target: PreAuthTarget,
    ) -> Result<String, ClientError> {
        let settings = primary_settings.ephemeral(target.client_id);
        let client = self.factory.build(settings, ClientHooks::detached())?;
        client.configure().await?;
        let result = client
            .authenticate(AuthenticateOptions::new(target.redirect_uri))
            .await?;
        Ok(result.user_info.sub)
    }
}

/// A random 128-bit hex `state` for the minted URL.
fn generate_state() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
