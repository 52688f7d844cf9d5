//! The orchestrator actor: owns all session state and processes commands
//! one at a time.
//!
//! Three kinds of messages share one queue:
//!
//! - **user commands** from [`SessionOrchestrator`](crate::SessionOrchestrator)
//! - **client reports** (state changes, social-login requests) posted by
//!   the hooks of the current client, tagged with its generation
//! - **completions** posted by the tasks the actor spawned for network
//!   work, also tagged with a generation
//!
//! Nothing here awaits network I/O, so the actor stays responsive while an
//! operation is in flight and can turn away conflicting commands through
//! the gate.
//!
//! A gated operation's [`GatePermit`] travels with its task and comes back
//! inside [`Command::Finished`]. The actor drops it before applying the
//! completion, so `is_loading` is already false when a failure is
//! surfaced, and a new command can only start after the completion has
//! been applied.

use std::future::Future;
use std::sync::Arc;

use sessionkit_client::{
    AuthClient, AuthClientFactory, ClientError, ClientHooks, ClientSettings,
    ConfigStore, ConfigStoreExt, Platform, SocialAuthBridge,
};
use sessionkit_flows::{
    App2AppConfirmation, App2AppHandoffController, BiometricController, FlowError,
    PreAuthOutcome, PreAuthTarget, PreAuthenticatedUrlController, Submission,
    approve_request, prepare_confirmation, reject_request,
};
use sessionkit_session::{
    ErrorClassifier, GatePermit, OperationGate, SessionStateTracker, SurfacedError,
};
use sessionkit_types::{
    AuthResult, AuthenticateOptions, Configuration, PromoteOptions,
    ReauthenticateOptions, SessionState, SessionStateChangeReason, UserInfo,
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::{CommandOutcome, SessionEvent, SessionSettings, SessionView};

pub(crate) type Reply = oneshot::Sender<CommandOutcome>;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Everything the actor can be asked to do.
pub(crate) enum Command {
    // -- From the handle ----------------------------------------------------
    Configure {
        config: Configuration,
        reply: Reply,
    },
    Authenticate {
        options: AuthenticateOptions,
        reply: Reply,
    },
    AuthenticateAnonymously {
        reply: Reply,
    },
    Reauthenticate {
        options: ReauthenticateOptions,
        reply: Reply,
    },
    Logout {
        reply: Reply,
    },
    PromoteAnonymous {
        options: PromoteOptions,
        reply: Reply,
    },
    FetchUserInfo {
        reply: Reply,
    },
    EnableBiometric {
        reply: Reply,
    },
    DisableBiometric {
        reply: Reply,
    },
    AuthenticateBiometric {
        reply: Reply,
    },
    SubmitApp2App {
        uri: String,
        reply: Reply,
    },
    ConfirmApp2App {
        reply: Reply,
    },
    CancelApp2App {
        reply: Reply,
    },
    IssuePreAuthenticatedUrl {
        target_client_id: Option<String>,
        target_redirect_uri: Option<String>,
        reply: Reply,
    },
    DeliverSocialResult {
        code: String,
        state: String,
        reply: Reply,
    },
    OpenSettings {
        reply: Reply,
    },
    Shutdown,

    // -- From client hooks --------------------------------------------------
    StateChanged {
        generation: u64,
        state: SessionState,
        reason: SessionStateChangeReason,
    },
    SocialAuthRequested {
        generation: u64,
        state: String,
    },

    // -- From spawned tasks -------------------------------------------------
    Finished {
        generation: u64,
        completion: Completion,
        permit: Option<GatePermit>,
        reply: Reply,
    },
}

/// The result of a spawned operation.
pub(crate) enum Completion {
    Configured(Result<(), ClientError>),
    /// Interactive, anonymous, and promote sign-ins.
    SignedIn(Result<AuthResult, ClientError>),
    /// `None`: the refreshed ID token does not allow re-authentication.
    Reauthenticated(Result<Option<AuthResult>, ClientError>),
    LoggedOut(Result<(), ClientError>),
    UserInfo(Result<UserInfo, ClientError>),
    BiometricEnabled(Result<(), ClientError>),
    BiometricSignedIn(Result<AuthResult, ClientError>),
    App2AppPrepared(Result<App2AppConfirmation, ClientError>),
    App2AppResponded(Result<(), ClientError>),
    PreAuthIssued(Result<PreAuthOutcome, ClientError>),
    SocialDelivered(Result<(), ClientError>),
    SettingsOpened(Result<(), ClientError>),
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// The external collaborators, shared with spawned tasks.
pub(crate) struct Collaborators<F, P, S, B> {
    pub(crate) factory: Arc<F>,
    pub(crate) platform: Arc<P>,
    pub(crate) store: Arc<S>,
    pub(crate) bridge: Arc<B>,
}

pub(crate) struct Actor<F: AuthClientFactory, P, S, B> {
    deps: Collaborators<F, P, S, B>,
    settings: SessionSettings,

    client: Option<Arc<F::Client>>,
    client_settings: Option<ClientSettings>,
    configured: bool,

    tracker: SessionStateTracker,
    gate: OperationGate,
    classifier: ErrorClassifier,
    biometric: BiometricController<P>,
    app2app: App2AppHandoffController<P>,
    preauth: PreAuthenticatedUrlController<F, P>,

    view: SessionView,
    view_tx: watch::Sender<SessionView>,
    events: broadcast::Sender<SessionEvent>,

    /// Weak, so the queue closes once every handle is gone. Spawned tasks
    /// and client hooks upgrade it when they have something to post.
    sender: mpsc::WeakUnboundedSender<Command>,
    receiver: mpsc::UnboundedReceiver<Command>,
}

impl<F, P, S, B> Actor<F, P, S, B>
where
    F: AuthClientFactory,
    P: Platform,
    S: ConfigStore,
    B: SocialAuthBridge,
{
    pub(crate) fn new(
        deps: Collaborators<F, P, S, B>,
        settings: SessionSettings,
        view: SessionView,
        view_tx: watch::Sender<SessionView>,
        events: broadcast::Sender<SessionEvent>,
        sender: mpsc::WeakUnboundedSender<Command>,
        receiver: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let biometric = BiometricController::new(
            Arc::clone(&deps.platform),
            settings.biometric_prompt.clone(),
        );
        let app2app = App2AppHandoffController::new(
            Arc::clone(&deps.platform),
            settings.app2app_reject_reason.clone(),
        );
        let preauth = PreAuthenticatedUrlController::new(
            Arc::clone(&deps.factory),
            Arc::clone(&deps.platform),
        );
        Self {
            deps,
            settings,
            client: None,
            client_settings: None,
            configured: false,
            tracker: SessionStateTracker::new(),
            gate: OperationGate::new(),
            classifier: ErrorClassifier,
            biometric,
            app2app,
            preauth,
            view,
            view_tx,
            events,
            sender,
            receiver,
        }
    }

    /// Runs the actor loop until shutdown or until every handle is dropped.
    pub(crate) async fn run(mut self) {
        info!("session orchestrator started");

        while let Some(cmd) = self.receiver.recv().await {
            if matches!(cmd, Command::Shutdown) {
                info!("session orchestrator shutting down");
                break;
            }
            self.handle(cmd);
            self.publish();
        }

        info!("session orchestrator stopped");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Configure { config, reply } => self.handle_configure(config, reply),
            Command::Authenticate { options, reply } => self.handle_authenticate(options, reply),
            Command::AuthenticateAnonymously { reply } => {
                self.run_gated("authenticate_anonymously", reply, |client| async move {
                    Completion::SignedIn(client.authenticate_anonymously().await)
                });
            }
            Command::Reauthenticate { options, reply } => {
                self.handle_reauthenticate(options, reply)
            }
            Command::Logout { reply } => {
                self.run_gated("logout", reply, |client| async move {
                    Completion::LoggedOut(client.logout().await)
                });
            }
            Command::PromoteAnonymous { mut options, reply } => {
                if options.redirect_uri.is_empty() {
                    options.redirect_uri = self.settings.redirect_uri.clone();
                }
                self.run_gated("promote_anonymous", reply, |client| async move {
                    Completion::SignedIn(client.promote_anonymous(options).await)
                });
            }
            Command::FetchUserInfo { reply } => {
                self.run_ungated(reply, |client| async move {
                    Completion::UserInfo(client.fetch_user_info().await)
                });
            }
            Command::EnableBiometric { reply } => {
                let ctl = self.biometric.clone();
                self.run_gated("enable_biometric", reply, |client| async move {
                    Completion::BiometricEnabled(ctl.enable(client).await)
                });
            }
            Command::DisableBiometric { reply } => self.handle_disable_biometric(reply),
            Command::AuthenticateBiometric { reply } => {
                let ctl = self.biometric.clone();
                self.run_gated("authenticate_biometric", reply, |client| async move {
                    Completion::BiometricSignedIn(ctl.authenticate(client).await)
                });
            }
            Command::SubmitApp2App { uri, reply } => {
                match self.app2app.submit(uri, self.configured) {
                    Submission::Deferred => {
                        let _ = reply.send(CommandOutcome::Deferred);
                    }
                    Submission::Process(uri) => self.process_app2app(&uri, reply),
                }
            }
            Command::ConfirmApp2App { reply } => self.handle_confirm_app2app(reply),
            Command::CancelApp2App { reply } => self.handle_cancel_app2app(reply),
            Command::IssuePreAuthenticatedUrl {
                target_client_id,
                target_redirect_uri,
                reply,
            } => self.handle_issue_pre_auth(target_client_id, target_redirect_uri, reply),
            Command::DeliverSocialResult { code, state, reply } => {
                self.run_ungated(reply, |client| async move {
                    Completion::SocialDelivered(client.social_auth_callback(code, state).await)
                });
            }
            Command::OpenSettings { reply } => self.handle_open_settings(reply),
            Command::StateChanged {
                generation,
                state,
                reason,
            } => self.handle_state_changed(generation, state, reason),
            Command::SocialAuthRequested { generation, state } => {
                self.handle_social_request(generation, &state)
            }
            Command::Finished {
                generation,
                completion,
                permit,
                reply,
            } => {
                // Release before applying: every exit path clears loading.
                drop(permit);
                if generation != self.tracker.generation() {
                    debug!(
                        got = generation,
                        current = self.tracker.generation(),
                        "discarding completion from replaced client"
                    );
                    let _ = reply.send(CommandOutcome::Superseded);
                    return;
                }
                let outcome = self.apply(completion);
                // Publish first so the caller sees the final view on reply.
                self.publish();
                let _ = reply.send(outcome);
            }
            Command::Shutdown => {}
        }
    }

    // -----------------------------------------------------------------------
    // Configure
    // -----------------------------------------------------------------------

    fn handle_configure(&mut self, config: Configuration, reply: Reply) {
        let Some(permit) = self.acquire("configure") else {
            let _ = reply.send(CommandOutcome::Busy);
            return;
        };

        if let Err(e) = config.validate() {
            let outcome = self.fail_with(SurfacedError::generic(e.to_string()));
            let _ = reply.send(outcome);
            return;
        }

        // Abandon the old client first, so nothing it still reports can
        // touch the state of the new one.
        let generation = self.tracker.begin_generation();
        self.reset_session(config.clone());

        if let Err(e) = self.deps.store.save_configuration(&config) {
            let outcome = self.fail_with(SurfacedError::generic(format!(
                "failed to save configuration: {e}"
            )));
            let _ = reply.send(outcome);
            return;
        }

        let settings = ClientSettings::from_configuration(&config);
        let client = match self.deps.factory.build(settings.clone(), self.hooks(generation)) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                let outcome = self.fail(&e);
                let _ = reply.send(outcome);
                return;
            }
        };
        info!(generation, client_id = %config.client_id, "auth client built");

        self.client = Some(Arc::clone(&client));
        self.client_settings = Some(settings);
        self.spawn(Some(permit), reply, async move {
            Completion::Configured(client.configure().await)
        });
    }

    /// Clears everything derived from the previous client.
    fn reset_session(&mut self, config: Configuration) {
        let was = self.view.session_state;
        self.client = None;
        self.client_settings = None;
        self.configured = false;
        self.app2app.reset();

        self.view = SessionView {
            configuration: config,
            ..SessionView::default()
        };
        if was != SessionState::Unknown {
            self.emit(SessionEvent::StateChanged {
                state: SessionState::Unknown,
                reason: SessionStateChangeReason::Clear,
            });
        }
    }

    /// Hooks for the client of `generation`, posting into this actor.
    fn hooks(&self, generation: u64) -> ClientHooks {
        let on_state = self.sender.clone();
        let on_social = self.sender.clone();
        ClientHooks::new(
            move |state, reason| {
                if let Some(tx) = on_state.upgrade() {
                    let _ = tx.send(Command::StateChanged {
                        generation,
                        state,
                        reason,
                    });
                }
            },
            move |state| {
                if let Some(tx) = on_social.upgrade() {
                    let _ = tx.send(Command::SocialAuthRequested { generation, state });
                }
            },
        )
    }

    // -----------------------------------------------------------------------
    // Commands with extra steps
    // -----------------------------------------------------------------------

    fn handle_authenticate(&mut self, mut options: AuthenticateOptions, reply: Reply) {
        if options.redirect_uri.is_empty() {
            options.redirect_uri = self.settings.redirect_uri.clone();
        }
        self.run_gated("authenticate", reply, |client| async move {
            Completion::SignedIn(client.authenticate(options).await)
        });
    }

    fn handle_reauthenticate(&mut self, mut options: ReauthenticateOptions, reply: Reply) {
        if options.redirect_uri.is_empty() {
            options.redirect_uri = self.settings.redirect_uri.clone();
        }
        self.run_gated("reauthenticate", reply, |client| async move {
            let result: Result<Option<AuthResult>, ClientError> = async {
                client.refresh_id_token().await?;
                if !client.can_reauthenticate() {
                    return Ok(None);
                }
                client.reauthenticate(options).await.map(Some)
            }
            .await;
            Completion::Reauthenticated(result)
        });
    }

    fn handle_disable_biometric(&mut self, reply: Reply) {
        let Some(client) = self.ready_client() else {
            let outcome = self.fail(&ClientError::NotConfigured);
            let _ = reply.send(outcome);
            return;
        };
        let outcome = match self.biometric.disable(&*client) {
            Ok(()) => CommandOutcome::Completed,
            Err(e) => self.fail(&e),
        };
        self.refresh_biometric();
        let _ = reply.send(outcome);
    }

    fn process_app2app(&mut self, uri: &str, reply: Reply) {
        let Some(client) = self.ready_client() else {
            let outcome = self.fail(&ClientError::NotConfigured);
            let _ = reply.send(outcome);
            return;
        };
        match self.app2app.begin(uri, self.tracker.state(), &*client) {
            Ok(request) => {
                info!(client_id = %request.client_id, "processing app2app request");
                self.spawn(None, reply, async move {
                    Completion::App2AppPrepared(prepare_confirmation(client, request).await)
                });
            }
            Err(e) => {
                let outcome = self.fail_flow(e);
                let _ = reply.send(outcome);
            }
        }
    }

    /// Processes a parked app2app request if it is ready.
    fn drain_app2app(&mut self) {
        if let Some(pending) = self.app2app.take_ready(self.configured, self.tracker.state()) {
            info!("processing parked app2app request");
            // Nobody is waiting on the original submit any more.
            let (reply, _) = oneshot::channel();
            self.process_app2app(&pending.request_uri, reply);
        }
    }

    fn handle_confirm_app2app(&mut self, reply: Reply) {
        let Some(permit) = self.acquire("approve_app2app") else {
            let _ = reply.send(CommandOutcome::Busy);
            return;
        };
        let Some(client) = self.ready_client() else {
            let outcome = self.fail(&ClientError::NotConfigured);
            let _ = reply.send(outcome);
            return;
        };
        let Some(request) = self.app2app.take_for_approval() else {
            let _ = reply.send(CommandOutcome::NotEligible);
            return;
        };
        self.view.confirmation = None;
        self.spawn(Some(permit), reply, async move {
            Completion::App2AppResponded(approve_request(client, request).await)
        });
    }

    fn handle_cancel_app2app(&mut self, reply: Reply) {
        let Some(client) = self.ready_client() else {
            let outcome = self.fail(&ClientError::NotConfigured);
            let _ = reply.send(outcome);
            return;
        };
        let Some((request, reason)) = self.app2app.take_for_rejection() else {
            let _ = reply.send(CommandOutcome::NotEligible);
            return;
        };
        // Close the prompt before the network call.
        self.view.confirmation = None;
        self.publish();
        self.spawn(None, reply, async move {
            Completion::App2AppResponded(reject_request(client, request, reason).await)
        });
    }

    fn handle_issue_pre_auth(
        &mut self,
        target_client_id: Option<String>,
        target_redirect_uri: Option<String>,
        reply: Reply,
    ) {
        let (Some(client), Some(settings)) = (self.ready_client(), self.client_settings.clone())
        else {
            let outcome = self.fail(&ClientError::NotConfigured);
            let _ = reply.send(outcome);
            return;
        };
        let target = PreAuthTarget::resolve(
            target_client_id,
            target_redirect_uri,
            &self.view.configuration,
            &self.settings.redirect_uri,
        );
        info!(target_client_id = %target.client_id, "issuing pre-authenticated url");
        let ctl = self.preauth.clone();
        let primary_redirect = self.settings.redirect_uri.clone();
        self.spawn(None, reply, async move {
            Completion::PreAuthIssued(
                ctl.issue_and_redeem(client, settings, primary_redirect, target)
                    .await,
            )
        });
    }

    fn handle_open_settings(&mut self, reply: Reply) {
        if self.ready_client().is_none() {
            let outcome = self.fail(&ClientError::NotConfigured);
            let _ = reply.send(outcome);
            return;
        }
        let url = match self.view.configuration.settings_url() {
            Ok(url) => url,
            Err(e) => {
                let outcome = self.fail_with(SurfacedError::generic(e.to_string()));
                let _ = reply.send(outcome);
                return;
            }
        };
        debug!(%url, "opening settings page");
        let platform = Arc::clone(&self.deps.platform);
        let redirect_uri = self.settings.redirect_uri.clone();
        self.spawn(None, reply, async move {
            Completion::SettingsOpened(platform.open_authorization_url(url, redirect_uri).await)
        });
    }

    // -----------------------------------------------------------------------
    // Client reports
    // -----------------------------------------------------------------------

    fn handle_state_changed(
        &mut self,
        generation: u64,
        state: SessionState,
        reason: SessionStateChangeReason,
    ) {
        if self.tracker.apply(generation, state, reason).is_err() {
            return;
        }

        self.view.session_state = state;
        if let Some(client) = &self.client {
            self.view.access_token = client.access_token();
            self.view.can_reauthenticate = client.can_reauthenticate();
        }
        if !state.is_authenticated() {
            self.view.user_info = None;
            self.view.can_reauthenticate = false;
        }
        if self.app2app.on_state(state) {
            self.view.confirmation = None;
        }
        self.emit(SessionEvent::StateChanged { state, reason });
        self.drain_app2app();
    }

    fn handle_social_request(&mut self, generation: u64, state: &str) {
        if generation != self.tracker.generation() {
            debug!(got = generation, "dropping social request from replaced client");
            return;
        }
        info!("forwarding social login request to bridge");
        if let Err(e) = self.deps.bridge.send_auth_request(state) {
            let _ = self.fail(&e);
        }
    }

    // -----------------------------------------------------------------------
    // Completions
    // -----------------------------------------------------------------------

    fn apply(&mut self, completion: Completion) -> CommandOutcome {
        match completion {
            Completion::Configured(Ok(())) => {
                self.configured = true;
                self.view.is_configured = true;
                info!(state = %self.tracker.state(), "auth client configured");
                self.emit(SessionEvent::Configured);
                self.refresh_reauth();
                self.refresh_biometric();
                self.drain_app2app();
                CommandOutcome::Completed
            }
            Completion::Configured(Err(e)) => {
                // A failed configure leaves nothing usable behind, and the
                // failed client can no longer move the state.
                self.tracker.abandon();
                self.client = None;
                self.client_settings = None;
                self.view.session_state = SessionState::Unknown;
                self.fail(&e)
            }

            Completion::SignedIn(result) => match result {
                Ok(result) => {
                    self.signed_in(result);
                    self.refresh_biometric();
                    CommandOutcome::Completed
                }
                Err(e) => self.fail(&e),
            },

            Completion::Reauthenticated(result) => match result {
                Ok(Some(result)) => {
                    self.signed_in(result);
                    CommandOutcome::Completed
                }
                Ok(None) => {
                    debug!("re-authentication not allowed by id token");
                    CommandOutcome::NotEligible
                }
                Err(e) => self.fail(&e),
            },

            Completion::LoggedOut(result) => {
                let outcome = match result {
                    Ok(()) => {
                        self.view.user_info = None;
                        self.view.can_reauthenticate = false;
                        CommandOutcome::Completed
                    }
                    Err(e) => self.fail(&e),
                };
                self.refresh_biometric();
                outcome
            }

            Completion::UserInfo(result) => match result {
                Ok(user) => {
                    self.view.user_info = Some(user);
                    self.refresh_reauth();
                    CommandOutcome::Completed
                }
                Err(e) => self.fail(&e),
            },

            Completion::BiometricEnabled(result) => {
                let outcome = match result {
                    Ok(()) => CommandOutcome::Completed,
                    Err(e) => self.fail(&e),
                };
                self.refresh_biometric();
                outcome
            }

            Completion::BiometricSignedIn(result) => {
                let outcome = match result {
                    Ok(result) => {
                        self.signed_in(result);
                        CommandOutcome::Completed
                    }
                    Err(e) => self.fail(&e),
                };
                self.refresh_biometric();
                outcome
            }

            Completion::App2AppPrepared(result) => match result {
                Ok(confirmation) => {
                    let message = confirmation.message.clone();
                    match self.app2app.present(confirmation, self.tracker.state()) {
                        Ok(()) => {
                            self.view.confirmation = self.app2app.confirmation().cloned();
                            self.emit(SessionEvent::App2AppConfirmationRequested { message });
                            CommandOutcome::Completed
                        }
                        Err(e) => self.fail_flow(e),
                    }
                }
                Err(e) => self.fail(&e),
            },

            Completion::App2AppResponded(result)
            | Completion::SocialDelivered(result)
            | Completion::SettingsOpened(result) => {
                match result {
                    Ok(()) => CommandOutcome::Completed,
                    Err(e) => self.fail(&e),
                }
            }

            Completion::PreAuthIssued(result) => match result {
                Ok(PreAuthOutcome::SecondaryAuthenticated { client_id, sub }) => {
                    self.emit(SessionEvent::SecondaryAuthenticated { client_id, sub });
                    CommandOutcome::Completed
                }
                Ok(PreAuthOutcome::HandedOff { .. } | PreAuthOutcome::SecondaryFailed { .. }) => {
                    CommandOutcome::Completed
                }
                Err(e) => self.fail(&e),
            },
        }
    }

    fn signed_in(&mut self, result: AuthResult) {
        info!(sub = %result.user_info.sub, "signed in");
        self.view.user_info = Some(result.user_info);
        self.refresh_reauth();
    }

    fn refresh_reauth(&mut self) {
        if let Some(client) = &self.client {
            self.view.can_reauthenticate = client.can_reauthenticate();
            self.view.access_token = client.access_token();
        }
    }

    fn refresh_biometric(&mut self) {
        let status = match self.ready_client() {
            Some(client) => self.biometric.refresh_availability(&*client),
            None => Default::default(),
        };
        self.view.biometric_available = status.available;
        self.view.biometric_enabled = status.enabled;
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    /// The client, if it has finished configuring.
    fn ready_client(&self) -> Option<Arc<F::Client>> {
        if self.configured {
            self.client.clone()
        } else {
            None
        }
    }

    /// Acquires the gate and clears the previous error. `None` if busy.
    fn acquire(&mut self, op: &'static str) -> Option<GatePermit> {
        match self.gate.try_acquire(op) {
            Ok(permit) => {
                self.view.error = None;
                // Show the spinner while the operation is in flight.
                self.publish();
                Some(permit)
            }
            Err(e) => {
                debug!(error = %e, "command ignored");
                None
            }
        }
    }

    fn run_gated<Fut>(
        &mut self,
        op: &'static str,
        reply: Reply,
        work: impl FnOnce(Arc<F::Client>) -> Fut,
    ) where
        Fut: Future<Output = Completion> + Send + 'static,
    {
        let Some(permit) = self.acquire(op) else {
            let _ = reply.send(CommandOutcome::Busy);
            return;
        };
        let Some(client) = self.ready_client() else {
            drop(permit);
            let outcome = self.fail(&ClientError::NotConfigured);
            let _ = reply.send(outcome);
            return;
        };
        self.spawn(Some(permit), reply, work(client));
    }

    fn run_ungated<Fut>(&mut self, reply: Reply, work: impl FnOnce(Arc<F::Client>) -> Fut)
    where
        Fut: Future<Output = Completion> + Send + 'static,
    {
        let Some(client) = self.ready_client() else {
            let outcome = self.fail(&ClientError::NotConfigured);
            let _ = reply.send(outcome);
            return;
        };
        self.spawn(None, reply, work(client));
    }

    /// Runs `work` on its own task and posts its completion back.
    fn spawn<Fut>(&self, permit: Option<GatePermit>, reply: Reply, work: Fut)
    where
        Fut: Future<Output = Completion> + Send + 'static,
    {
        let generation = self.tracker.generation();
        let Some(sender) = self.sender.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let completion = work.await;
            let _ = sender.send(Command::Finished {
                generation,
                completion,
                permit,
                reply,
            });
        });
    }

    /// Classifies and surfaces a client failure.
    fn fail(&mut self, error: &ClientError) -> CommandOutcome {
        match self.classifier.surface(error) {
            None => {
                debug!("operation cancelled by user");
                CommandOutcome::Cancelled
            }
            Some(surfaced) => self.fail_with(surfaced),
        }
    }

    fn fail_flow(&mut self, error: FlowError) -> CommandOutcome {
        match error {
            FlowError::Client(e) => self.fail(&e),
            other => self.fail_with(SurfacedError::generic(other.to_string())),
        }
    }

    fn fail_with(&mut self, surfaced: SurfacedError) -> CommandOutcome {
        warn!(kind = %surfaced.kind, message = %surfaced.message, "operation failed");
        self.view.error = Some(surfaced.clone());
        self.emit(SessionEvent::Error(surfaced.clone()));
        CommandOutcome::Failed(surfaced)
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn publish(&mut self) {
        self.view.is_loading = self.gate.is_busy();
        self.view_tx.send_if_modified(|current| {
            if *current == self.view {
                false
            } else {
                *current = self.view.clone();
                true
            }
        });
    }
}
