//! `SessionOrchestrator`: the handle the UI talks to, and its builder.
//!
//! The orchestrator is an actor. One Tokio task owns every piece of
//! session state; the handle only sends it commands and reads the
//! snapshots it publishes.
//!
//! ```text
//!   UI ──command──▶ SessionOrchestrator ──mpsc──▶ actor task
//!                        ▲      ▲                    │ spawns network work
//!                        │      │                    ▼
//!        watch<SessionView>  broadcast<SessionEvent>  tasks post completions
//!                                                      back into the queue
//! ```
//!
//! Every command method resolves once its operation has finished, with a
//! [`CommandOutcome`]. It only returns `Err` if the actor is gone.

use std::sync::Arc;

use sessionkit_client::{
    AuthClientFactory, ConfigStore, ConfigStoreExt, Platform, SocialAuthBridge,
};
use sessionkit_types::{
    AuthenticateOptions, BiometricPrompt, Configuration, PromoteOptions,
    ReauthenticateOptions,
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::info;

use crate::actor::{Actor, Collaborators, Command, Reply};
use crate::{CommandOutcome, SessionEvent, SessionKitError, SessionSettings, SessionView};

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for a [`SessionOrchestrator`].
///
/// # Example
///
/// ```rust,ignore
/// let orchestrator = SessionOrchestrator::builder()
///     .redirect_uri("com.example.app://host/path")
///     .build(factory, platform, store, bridge)?;
/// orchestrator.configure(Configuration::new("client", "https://auth.example")).await?;
/// ```
#[derive(Debug, Default)]
pub struct SessionOrchestratorBuilder {
    settings: SessionSettings,
}

impl SessionOrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all settings at once.
    pub fn settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.settings.redirect_uri = redirect_uri.into();
        self
    }

    pub fn biometric_prompt(mut self, prompt: BiometricPrompt) -> Self {
        self.settings.biometric_prompt = prompt;
        self
    }

    pub fn app2app_reject_reason(mut self, reason: impl Into<String>) -> Self {
        self.settings.app2app_reject_reason = reason.into();
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.settings.event_capacity = capacity.max(1);
        self
    }

    /// Reads the last-used configuration from `store` and spawns the actor.
    ///
    /// No network call happens here; the client is built on the first
    /// [`configure`](SessionOrchestrator::configure).
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// [`SessionKitError::Store`] if the stored configuration can't be read.
    pub fn build<F, P, S, B>(
        self,
        factory: F,
        platform: P,
        store: S,
        bridge: B,
    ) -> Result<SessionOrchestrator, SessionKitError>
    where
        F: AuthClientFactory,
        P: Platform,
        S: ConfigStore,
        B: SocialAuthBridge,
    {
        let configuration = store.load_configuration()?;
        info!(client_id = %configuration.client_id, "loaded stored configuration");

        let initial = SessionView {
            configuration,
            ..SessionView::default()
        };
        let (view_tx, view_rx) = watch::channel(initial.clone());
        let (events, _) = broadcast::channel(self.settings.event_capacity);
        let (tx, rx) = mpsc::unbounded_channel();

        let actor = Actor::new(
            Collaborators {
                factory: Arc::new(factory),
                platform: Arc::new(platform),
                store: Arc::new(store),
                bridge: Arc::new(bridge),
            },
            self.settings,
            initial,
            view_tx,
            events.clone(),
            tx.downgrade(),
            rx,
        );
        tokio::spawn(actor.run());

        Ok(SessionOrchestrator {
            sender: tx,
            view: view_rx,
            events,
        })
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running session orchestrator.
///
/// Cheap to clone. The actor stops when every handle is dropped or
/// [`shutdown`](Self::shutdown) is called.
#[derive(Debug, Clone)]
pub struct SessionOrchestrator {
    sender: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<SessionView>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionOrchestrator {
    pub fn builder() -> SessionOrchestratorBuilder {
        SessionOrchestratorBuilder::new()
    }

    // -- Observers ----------------------------------------------------------

    /// The latest published snapshot.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// A receiver that is notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Events published from now on.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Persists `config`, replaces the auth client, and configures it.
    /// Ignored while another gated operation is in flight.
    pub async fn configure(
        &self,
        config: Configuration,
    ) -> Result<CommandOutcome, SessionKitError> {
        self.request(|reply| Command::Configure { config, reply }).await
    }

    /// Tells the actor to stop after the commands already queued.
    pub fn shutdown(&self) -> Result<(), SessionKitError> {
        self.sender
            .send(Command::Shutdown)
            .map_err(|_| SessionKitError::Unavailable)
    }

    // -- Authentication -----------------------------------------------------

    /// Interactive sign-in. An empty `redirect_uri` is filled in from the
    /// settings.
    pub async fn authenticate(
        &self,
        options: AuthenticateOptions,
    ) -> Result<CommandOutcome, SessionKitError> {
        self.request(|reply| Command::Authenticate { options, reply }).await
    }

    pub async fn authenticate_anonymously(&self) -> Result<CommandOutcome, SessionKitError> {
        self.request(|reply| Command::AuthenticateAnonymously { reply }).await
    }

    /// Refreshes the ID token, then re-authenticates if the token allows
    /// it. Resolves to [`CommandOutcome::NotEligible`] otherwise.
    pub async fn reauthenticate(
        &self,
        options: ReauthenticateOptions,
    ) -> Result<CommandOutcome, SessionKitError> {
        self.request(|reply| Command::Reauthenticate { options, reply }).await
    }

    pub async fn logout(&self) -> Result<CommandOutcome, SessionKitError> {
        self.request(|reply| Command::Logout { reply }).await
    }

    pub async fn promote_anonymous(
        &self,
        options: PromoteOptions,
    ) -> Result<CommandOutcome, SessionKitError> {
        self.request(|reply| Command::PromoteAnonymous { options, reply }).await
    }

    /// Not gated: may run alongside another operation.
    pub async fn fetch_user_info(&self) -> Result<CommandOutcome, SessionKitError> {
        self.request(|reply| Command::FetchUserInfo { reply }).await
    }

    // -- Biometric ----------------------------------------------------------

    pub async fn enable_biometric(&self) -> Result<CommandOutcome, SessionKitError> {
        self.request(|reply| Command::EnableBiometric { reply }).await
    }

    /// Not gated.
    pub async fn disable_biometric(&self) -> Result<CommandOutcome, SessionKitError> {
        self.request(|reply| Command::DisableBiometric { reply }).await
    }

    pub async fn authenticate_biometric(&self) -> Result<CommandOutcome, SessionKitError> {
        self.request(|reply| Command::AuthenticateBiometric { reply }).await
    }

    // -- App2app ------------------------------------------------------------

    /// Hands an inbound app2app deep link to the orchestrator. Before the
    /// client is configured the link is parked and this resolves to
    /// [`CommandOutcome::Deferred`]; otherwise it resolves once the
    /// confirmation is open (or the request failed).
    pub async fn submit_app2app(
        &self,
        uri: impl Into<String>,
    ) -> Result<CommandOutcome, SessionKitError> {
        let uri = uri.into();
        self.request(|reply| Command::SubmitApp2App { uri, reply }).await
    }

    /// Approves the open confirmation.
    pub async fn confirm_app2app(&self) -> Result<CommandOutcome, SessionKitError> {
        self.request(|reply| Command::ConfirmApp2App { reply }).await
    }

    /// Rejects the open confirmation.
    pub async fn cancel_app2app(&self) -> Result<CommandOutcome, SessionKitError> {
        self.request(|reply| Command::CancelApp2App { reply }).await
    }

    // -- Pre-authenticated URL ----------------------------------------------

    /// Mints a pre-authenticated URL for the target client and redeems
    /// it. Targets default to the configured pre-auth targets, then to the
    /// primary session's own client id and redirect URI.
    pub async fn issue_pre_authenticated_url(
        &self,
        target_client_id: Option<String>,
        target_redirect_uri: Option<String>,
    ) -> Result<CommandOutcome, SessionKitError> {
        self.request(|reply| Command::IssuePreAuthenticatedUrl {
            target_client_id,
            target_redirect_uri,
            reply,
        })
        .await
    }

    // -- Social login -------------------------------------------------------

    /// Forwards the result a social-login app handed back to the host app.
    pub async fn deliver_social_result(
        &self,
        code: impl Into<String>,
        state: impl Into<String>,
    ) -> Result<CommandOutcome, SessionKitError> {
        let (code, state) = (code.into(), state.into());
        self.request(|reply| Command::DeliverSocialResult { code, state, reply })
            .await
    }

    // -- Account pages ------------------------------------------------------

    /// Opens the account settings page of the configured endpoint. Runs
    /// alongside a gated operation and leaves the session untouched.
    pub async fn open_settings(&self) -> Result<CommandOutcome, SessionKitError> {
        self.request(|reply| Command::OpenSettings { reply }).await
    }

    // -- Plumbing -----------------------------------------------------------

    async fn request(
        &self,
        command: impl FnOnce(Reply) -> Command,
    ) -> Result<CommandOutcome, SessionKitError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .map_err(|_| SessionKitError::Unavailable)?;
        reply_rx.await.map_err(|_| SessionKitError::Unavailable)
    }
}
