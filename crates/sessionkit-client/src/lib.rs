//! Contracts for the collaborators sessionkit does not implement itself.
//!
//! Provides the [`AuthClient`] and [`AuthClientFactory`] traits that abstract
//! over the OAuth/OIDC engine, plus the smaller seams around it:
//! [`ConfigStore`] for persisted configuration, [`SocialAuthBridge`] for
//! push-based social login, and [`Platform`] for capability checks and the
//! authorization-URL presentation surface.
//!
//! # Feature Flags
//!
//! - `json-file` (default): [`JsonFileConfigStore`], a file-backed store
//! - `scripted`: an in-memory scripted backend implementing every trait
//!   here, for demos and tests

#![allow(async_fn_in_trait)]

mod error;
mod hooks;
#[cfg(feature = "json-file")]
mod json_store;
#[cfg(feature = "scripted")]
pub mod scripted;
mod store;

pub use error::{
    BiometricCanAuthenticateCode, BiometricPromptCode, ClientError, StoreError,
};
pub use hooks::ClientHooks;
#[cfg(feature = "json-file")]
pub use json_store::JsonFileConfigStore;
pub use store::{ConfigStore, ConfigStoreExt, MemoryConfigStore, keys};

use std::future::Future;

use sessionkit_types::{
    AllowedAuthenticators, App2AppRequest, AuthResult, AuthenticateOptions,
    BiometricPrompt, Configuration, PreAuthenticatedUrlOptions,
    PromoteOptions, ReauthenticateOptions, TokenStorageKind, UiVariant,
    UserInfo,
};
use url::Url;

// ---------------------------------------------------------------------------
// Client settings
// ---------------------------------------------------------------------------

/// The subset of a [`Configuration`] an auth client is built from, plus the
/// derived storage and presentation choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub client_id: String,
    pub endpoint: String,
    pub sso_enabled: bool,
    pub token_storage: TokenStorageKind,
    pub ui_variant: UiVariant,
    pub app2app_endpoint: Option<String>,
    pub pre_authenticated_url_enabled: bool,
}

impl ClientSettings {
    pub fn from_configuration(config: &Configuration) -> Self {
        Self {
            client_id: config.client_id.clone(),
            endpoint: config.endpoint.clone(),
            sso_enabled: config.sso_enabled,
            token_storage: config.token_storage(),
            ui_variant: config.ui_variant(),
            app2app_endpoint: config.app2app_endpoint().map(str::to_string),
            pre_authenticated_url_enabled: config.pre_auth_enabled,
        }
    }

    /// Settings for a throwaway client: same provider, another client id,
    /// tokens kept in memory only.
    pub fn ephemeral(&self, client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            token_storage: TokenStorageKind::Transient,
            app2app_endpoint: None,
            pre_authenticated_url_enabled: false,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// AuthClient
// ---------------------------------------------------------------------------

/// One OAuth/OIDC client session.
///
/// Network operations are async; the quick local reads (`access_token`,
/// biometric key checks) are plain methods. Session-state changes are not
/// returned from any method: the client reports them through the
/// [`ClientHooks`] it was built with, and that report is the only source
/// of truth for the session state.
///
/// Futures must be `Send` because the orchestrator runs them on spawned
/// Tokio tasks.
pub trait AuthClient: Send + Sync + 'static {
    /// Loads stored tokens and reports the initial session state.
    fn configure(
        &self,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Runs an interactive authorization-code flow.
    fn authenticate(
        &self,
        options: AuthenticateOptions,
    ) -> impl Future<Output = Result<AuthResult, ClientError>> + Send;

    /// Creates an anonymous user bound to this device.
    fn authenticate_anonymously(
        &self,
    ) -> impl Future<Output = Result<AuthResult, ClientError>> + Send;

    /// Asks the current user to prove their identity again.
    fn reauthenticate(
        &self,
        options: ReauthenticateOptions,
    ) -> impl Future<Output = Result<AuthResult, ClientError>> + Send;

    fn logout(&self) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Turns the current anonymous user into a regular one.
    fn promote_anonymous(
        &self,
        options: PromoteOptions,
    ) -> impl Future<Output = Result<AuthResult, ClientError>> + Send;

    fn fetch_user_info(
        &self,
    ) -> impl Future<Output = Result<UserInfo, ClientError>> + Send;

    /// Fetches a fresh ID token, which carries the re-authentication claim.
    fn refresh_id_token(
        &self,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Whether the current ID token allows re-authentication.
    fn can_reauthenticate(&self) -> bool;

    /// The current access token, if any.
    fn access_token(&self) -> Option<String>;

    // -- Biometric ---------------------------------------------------------

    /// Fails if the device cannot do biometric auth with `allowed`.
    fn check_biometric_supported(
        &self,
        allowed: AllowedAuthenticators,
    ) -> Result<(), ClientError>;

    /// Whether a biometric key is enrolled for this session.
    fn is_biometric_enabled(&self) -> Result<bool, ClientError>;

    fn disable_biometric(&self) -> Result<(), ClientError>;

    /// Creates the biometric key, confirmed through `prompt`.
    fn enable_biometric(
        &self,
        prompt: BiometricPrompt,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Signs in with the biometric key, without a browser round trip.
    fn authenticate_biometric(
        &self,
        prompt: BiometricPrompt,
    ) -> impl Future<Output = Result<AuthResult, ClientError>> + Send;

    // -- App2app -----------------------------------------------------------

    /// Parses an inbound app2app deep link. Returns `None` if the URI is
    /// not an app2app request.
    fn parse_app2app_request(&self, uri: &str) -> Option<App2AppRequest> {
        App2AppRequest::parse(uri).ok()
    }

    /// Approves the request on behalf of the current user and redirects
    /// back to the requesting app.
    fn approve_app2app_request(
        &self,
        request: App2AppRequest,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Rejects the request, redirecting back with `reason` as the error.
    fn reject_app2app_request(
        &self,
        request: App2AppRequest,
        reason: ClientError,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    // -- Pre-authenticated URL ---------------------------------------------

    fn make_pre_authenticated_url(
        &self,
        options: PreAuthenticatedUrlOptions,
    ) -> impl Future<Output = Result<Url, ClientError>> + Send;

    // -- Social login ------------------------------------------------------

    /// Completes a social login with the code delivered by the bridge.
    fn social_auth_callback(
        &self,
        code: String,
        state: String,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;
}

/// Builds [`AuthClient`]s. The orchestrator builds a fresh one on every
/// configure, and the pre-authenticated URL flow builds throwaway ones.
pub trait AuthClientFactory: Send + Sync + 'static {
    type Client: AuthClient;

    /// # Errors
    /// Returns a [`ClientError`] if the settings cannot produce a client.
    fn build(
        &self,
        settings: ClientSettings,
        hooks: ClientHooks,
    ) -> Result<Self::Client, ClientError>;
}

// ---------------------------------------------------------------------------
// Social bridge and platform
// ---------------------------------------------------------------------------

/// Push-based social login transport (e.g. a messaging app's SDK).
///
/// The client asks for an auth request; the third-party app later hands a
/// `(code, state)` pair back to the host app, which forwards it through
/// `SessionOrchestrator::deliver_social_result`.
pub trait SocialAuthBridge: Send + Sync + 'static {
    fn send_auth_request(&self, state: &str) -> Result<(), ClientError>;
}

/// Host platform services.
pub trait Platform: Send + Sync + 'static {
    /// Whether the OS version supports biometric-bound keys at all.
    fn biometric_capable(&self) -> bool;

    /// Whether the OS supports verified app-to-app links.
    fn app2app_capable(&self) -> bool;

    /// Presents `url` in the authorization surface and resolves once the
    /// surface reached `redirect_uri` or was closed.
    fn open_authorization_url(
        &self,
        url: Url,
        redirect_uri: String,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;
}
