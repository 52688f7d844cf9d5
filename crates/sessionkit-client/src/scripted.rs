//! An in-memory scripted backend implementing every contract in this crate.
//!
//! Used by the walkthrough demo and by the test suites of the crates above
//! this one. One [`ScriptedBackend`] plays the identity provider: it holds
//! the "server-side" stored sessions per client id, the identity the next
//! login returns, scripted failures, and a log of every call made against
//! it. Clients built by a [`ScriptedFactory`] share that backend.
//!
//! ```text
//!   ScriptedBackend ──┬── ScriptedFactory ──build──▶ ScriptedClient (one per configure)
//!     stored tokens   │
//!     failures        ├── ScriptedPlatform   (capability flags, opened URLs)
//!     latches         │
//!     call log        └── RecordingSocialBridge
//! ```
//!
//! Latches let a test hold an operation in flight: while a latch is
//! installed for an [`Op`], every call of that op records itself and then
//! waits for [`Latch::release`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use sessionkit_types::{
    AllowedAuthenticators, App2AppRequest, AuthResult, AuthenticateOptions,
    BiometricPrompt, PreAuthenticatedUrlOptions, PromoteOptions,
    ReauthenticateOptions, SessionState, SessionStateChangeReason,
    TokenStorageKind, UserInfo,
};
use tokio::sync::{Notify, Semaphore};
use tracing::debug;
use url::Url;

use crate::{
    AuthClient, AuthClientFactory, ClientError, ClientHooks, ClientSettings,
    Platform, SocialAuthBridge,
};

// ---------------------------------------------------------------------------
// Call log
// ---------------------------------------------------------------------------

/// Every operation the scripted backend can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Build,
    Configure,
    Authenticate,
    AuthenticateAnonymously,
    Reauthenticate,
    Logout,
    PromoteAnonymous,
    FetchUserInfo,
    RefreshIdToken,
    EnableBiometric,
    DisableBiometric,
    AuthenticateBiometric,
    ApproveApp2App,
    RejectApp2App,
    MakePreAuthenticatedUrl,
    SocialCallback,
    OpenAuthorizationUrl,
    SendSocialRequest,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    /// The client id the call was made on (or targets, for app2app).
    pub client_id: String,
    /// Op-specific detail: a redirect URI, a rejection reason, a URL.
    pub detail: Option<String>,
}

/// Releases operations held by [`ScriptedBackend::hold`].
#[derive(Debug, Clone)]
pub struct Latch(Arc<Semaphore>);

impl Latch {
    /// Lets exactly one waiting (or future) call through.
    pub fn release(&self) {
        self.0.add_permits(1);
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct BackendState {
    stored_sessions: HashMap<String, UserInfo>,
    next_user: UserInfo,
    failures: HashMap<Op, VecDeque<ClientError>>,
    latches: HashMap<Op, Arc<Semaphore>>,
    biometric_support: Result<(), ClientError>,
    biometric_enrolled: HashSet<String>,
    calls: Vec<Call>,
}

/// The shared scripted identity provider. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    state: Arc<Mutex<BackendState>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        let mut user = UserInfo::new("user-1");
        user.email = Some("user@example.com".into());
        Self {
            state: Arc::new(Mutex::new(BackendState {
                stored_sessions: HashMap::new(),
                next_user: user,
                failures: HashMap::new(),
                latches: HashMap::new(),
                biometric_support: Ok(()),
                biometric_enrolled: HashSet::new(),
                calls: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -- Scripting ----------------------------------------------------------

    /// The identity returned by the next interactive or biometric login.
    pub fn set_user(&self, user: UserInfo) {
        self.lock().next_user = user;
    }

    /// Pretends `client_id` already has a stored refresh token for `user`.
    pub fn store_session(&self, client_id: &str, user: UserInfo) {
        self.lock().stored_sessions.insert(client_id.to_string(), user);
    }

    pub fn has_stored_session(&self, client_id: &str) -> bool {
        self.lock().stored_sessions.contains_key(client_id)
    }

    /// Makes the next call of `op` fail with `error`. Queues up.
    pub fn fail_next(&self, op: Op, error: ClientError) {
        self.lock().failures.entry(op).or_default().push_back(error);
    }

    /// Result of every subsequent biometric capability check.
    pub fn set_biometric_support(&self, support: Result<(), ClientError>) {
        self.lock().biometric_support = support;
    }

    /// Marks a biometric key as enrolled for `client_id`.
    pub fn enroll_biometric(&self, client_id: &str) {
        self.lock().biometric_enrolled.insert(client_id.to_string());
    }

    /// Holds every call of `op` until released through the returned latch.
    pub fn hold(&self, op: Op) -> Latch {
        let sem = Arc::new(Semaphore::new(0));
        self.lock().latches.insert(op, Arc::clone(&sem));
        Latch(sem)
    }

    // -- Inspection ---------------------------------------------------------

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn calls_of(&self, op: Op) -> Vec<Call> {
        self.lock().calls.iter().filter(|c| c.op == op).cloned().collect()
    }

    pub fn count(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|c| c.op == op).count()
    }

    /// Waits until `op` has been called at least `n` times.
    ///
    /// Gives up after two seconds and returns `false`.
    pub async fn wait_for(&self, op: Op, n: usize) -> bool {
        let poll = async {
            while self.count(op) < n {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(2), poll).await.is_ok()
    }

    // -- Used by the fakes --------------------------------------------------

    fn record(&self, op: Op, client_id: &str, detail: Option<String>) {
        debug!(?op, client_id, "scripted call");
        self.lock().calls.push(Call {
            op,
            client_id: client_id.to_string(),
            detail,
        });
    }

    /// Records the call, waits on its latch if any, then pops a scripted
    /// failure if one is queued.
    async fn enter(
        &self,
        op: Op,
        client_id: &str,
        detail: Option<String>,
    ) -> Result<(), ClientError> {
        self.record(op, client_id, detail);
        let latch = self.lock().latches.get(&op).cloned();
        if let Some(sem) = latch {
            sem.acquire()
                .await
                .map_err(|_| ClientError::Other("latch closed".into()))?
                .forget();
        }
        self.take_failure(op)
    }

    fn enter_sync(
        &self,
        op: Op,
        client_id: &str,
        detail: Option<String>,
    ) -> Result<(), ClientError> {
        self.record(op, client_id, detail);
        self.take_failure(op)
    }

    fn take_failure(&self, op: Op) -> Result<(), ClientError> {
        match self.lock().failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Factory and client
// ---------------------------------------------------------------------------

/// Builds [`ScriptedClient`]s over one backend.
#[derive(Debug, Clone)]
pub struct ScriptedFactory {
    backend: ScriptedBackend,
}

impl ScriptedFactory {
    pub fn new(backend: ScriptedBackend) -> Self {
        Self { backend }
    }
}

impl AuthClientFactory for ScriptedFactory {
    type Client = ScriptedClient;

    fn build(
        &self,
        settings: ClientSettings,
        hooks: ClientHooks,
    ) -> Result<ScriptedClient, ClientError> {
        let detail = format!("{:?}", settings.token_storage);
        self.backend
            .enter_sync(Op::Build, &settings.client_id, Some(detail))?;
        Ok(ScriptedClient {
            settings,
            hooks,
            backend: self.backend.clone(),
            session: Mutex::new(None),
            configured: Mutex::new(false),
            social_result: Notify::new(),
        })
    }
}

/// One scripted client session.
#[derive(Debug)]
pub struct ScriptedClient {
    settings: ClientSettings,
    hooks: ClientHooks,
    backend: ScriptedBackend,
    session: Mutex<Option<UserInfo>>,
    configured: Mutex<bool>,
    social_result: Notify,
}

impl ScriptedClient {
    fn client_id(&self) -> &str {
        &self.settings.client_id
    }

    fn current(&self) -> Option<UserInfo> {
        self.session.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn ensure_configured(&self) -> Result<(), ClientError> {
        if *self.configured.lock().unwrap_or_else(|e| e.into_inner()) {
            Ok(())
        } else {
            Err(ClientError::NotConfigured)
        }
    }

    fn require_session(&self) -> Result<UserInfo, ClientError> {
        self.current().ok_or_else(|| ClientError::Server {
            name: "Unauthorized".into(),
            reason: "NotAuthenticated".into(),
            message: "not authenticated".into(),
        })
    }

    fn sign_in(&self, user: UserInfo) {
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(user.clone());
        if self.settings.token_storage == TokenStorageKind::Persistent {
            self.backend.store_session(self.client_id(), user);
        }
        self.hooks.notify_state(
            SessionState::Authenticated,
            SessionStateChangeReason::Authenticated,
        );
    }

    fn next_user(&self) -> UserInfo {
        self.backend.lock().next_user.clone()
    }

    async fn maybe_social(&self, social_redirect_uri: Option<&str>, state: &str) {
        if social_redirect_uri.is_some() {
            self.hooks.request_social_auth(state);
            self.social_result.notified().await;
        }
    }
}

impl AuthClient for ScriptedClient {
    async fn configure(&self) -> Result<(), ClientError> {
        self.backend.enter(Op::Configure, self.client_id(), None).await?;
        *self.configured.lock().unwrap_or_else(|e| e.into_inner()) = true;

        let stored = match self.settings.token_storage {
            TokenStorageKind::Persistent => self
                .backend
                .lock()
                .stored_sessions
                .get(self.client_id())
                .cloned(),
            TokenStorageKind::Transient => None,
        };
        let found = stored.is_some();
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = stored;

        if found {
            self.hooks.notify_state(
                SessionState::Authenticated,
                SessionStateChangeReason::FoundToken,
            );
        } else {
            self.hooks.notify_state(
                SessionState::NoSession,
                SessionStateChangeReason::NoToken,
            );
        }
        Ok(())
    }

    async fn authenticate(
        &self,
        options: AuthenticateOptions,
    ) -> Result<AuthResult, ClientError> {
        self.ensure_configured()?;
        self.backend
            .enter(
                Op::Authenticate,
                self.client_id(),
                Some(options.redirect_uri.clone()),
            )
            .await?;
        let state = options.state.clone().unwrap_or_default();
        self.maybe_social(options.social_redirect_uri.as_deref(), &state)
            .await;

        let user = self.next_user();
        self.sign_in(user.clone());
        Ok(AuthResult {
            user_info: user,
            state: options.state,
        })
    }

    async fn authenticate_anonymously(&self) -> Result<AuthResult, ClientError> {
        self.ensure_configured()?;
        self.backend
            .enter(Op::AuthenticateAnonymously, self.client_id(), None)
            .await?;
        let mut user = UserInfo::new(format!("anon-{}", self.client_id()));
        user.is_anonymous = true;
        user.is_verified = false;
        user.can_reauthenticate = false;
        self.sign_in(user.clone());
        Ok(AuthResult {
            user_info: user,
            state: None,
        })
    }

    async fn reauthenticate(
        &self,
        options: ReauthenticateOptions,
    ) -> Result<AuthResult, ClientError> {
        self.ensure_configured()?;
        self.backend
            .enter(
                Op::Reauthenticate,
                self.client_id(),
                Some(options.redirect_uri.clone()),
            )
            .await?;
        let user = self.require_session()?;
        let state = options.state.clone().unwrap_or_default();
        self.maybe_social(options.social_redirect_uri.as_deref(), &state)
            .await;
        self.hooks.notify_state(
            SessionState::Authenticated,
            SessionStateChangeReason::Authenticated,
        );
        Ok(AuthResult {
            user_info: user,
            state: options.state,
        })
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.ensure_configured()?;
        self.backend.enter(Op::Logout, self.client_id(), None).await?;
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = None;
        {
            let mut backend = self.backend.lock();
            backend.stored_sessions.remove(self.client_id());
            backend.biometric_enrolled.remove(self.client_id());
        }
        self.hooks
            .notify_state(SessionState::NoSession, SessionStateChangeReason::Logout);
        Ok(())
    }

    async fn promote_anonymous(
        &self,
        options: PromoteOptions,
    ) -> Result<AuthResult, ClientError> {
        self.ensure_configured()?;
        self.backend
            .enter(
                Op::PromoteAnonymous,
                self.client_id(),
                Some(options.redirect_uri.clone()),
            )
            .await?;
        let current = self.require_session()?;
        if !current.is_anonymous {
            return Err(ClientError::Server {
                name: "Invalid".into(),
                reason: "NotAnonymous".into(),
                message: "current user is not anonymous".into(),
            });
        }
        let mut user = self.next_user();
        user.sub = current.sub;
        self.sign_in(user.clone());
        Ok(AuthResult {
            user_info: user,
            state: options.state,
        })
    }

    async fn fetch_user_info(&self) -> Result<UserInfo, ClientError> {
        self.ensure_configured()?;
        self.backend
            .enter(Op::FetchUserInfo, self.client_id(), None)
            .await?;
        self.require_session()
    }

    async fn refresh_id_token(&self) -> Result<(), ClientError> {
        self.ensure_configured()?;
        self.backend
            .enter(Op::RefreshIdToken, self.client_id(), None)
            .await?;
        self.require_session().map(|_| ())
    }

    fn can_reauthenticate(&self) -> bool {
        self.current().is_some_and(|u| u.can_reauthenticate)
    }

    fn access_token(&self) -> Option<String> {
        self.current().map(|u| format!("at-{}", u.sub))
    }

    fn check_biometric_supported(
        &self,
        _allowed: AllowedAuthenticators,
    ) -> Result<(), ClientError> {
        self.backend.lock().biometric_support.clone()
    }

    fn is_biometric_enabled(&self) -> Result<bool, ClientError> {
        self.ensure_configured()?;
        Ok(self.backend.lock().biometric_enrolled.contains(self.client_id()))
    }

    fn disable_biometric(&self) -> Result<(), ClientError> {
        self.ensure_configured()?;
        self.backend
            .enter_sync(Op::DisableBiometric, self.client_id(), None)?;
        self.backend.lock().biometric_enrolled.remove(self.client_id());
        Ok(())
    }

    async fn enable_biometric(
        &self,
        prompt: BiometricPrompt,
    ) -> Result<(), ClientError> {
        self.ensure_configured()?;
        self.backend
            .enter(Op::EnableBiometric, self.client_id(), Some(prompt.title))
            .await?;
        self.require_session()?;
        self.backend.enroll_biometric(self.client_id());
        Ok(())
    }

    async fn authenticate_biometric(
        &self,
        prompt: BiometricPrompt,
    ) -> Result<AuthResult, ClientError> {
        self.ensure_configured()?;
        self.backend
            .enter(Op::AuthenticateBiometric, self.client_id(), Some(prompt.title))
            .await?;
        if !self.backend.lock().biometric_enrolled.contains(self.client_id()) {
            return Err(ClientError::BiometricPrivateKeyNotFound);
        }
        let user = self.next_user();
        self.sign_in(user.clone());
        Ok(AuthResult {
            user_info: user,
            state: None,
        })
    }

    async fn approve_app2app_request(
        &self,
        request: App2AppRequest,
    ) -> Result<(), ClientError> {
        self.ensure_configured()?;
        self.backend
            .enter(
                Op::ApproveApp2App,
                &request.client_id,
                Some(request.redirect_uri.clone()),
            )
            .await?;
        self.require_session().map(|_| ())
    }

    async fn reject_app2app_request(
        &self,
        request: App2AppRequest,
        reason: ClientError,
    ) -> Result<(), ClientError> {
        self.ensure_configured()?;
        self.backend
            .enter(Op::RejectApp2App, &request.client_id, Some(reason.to_string()))
            .await
    }

    async fn make_pre_authenticated_url(
        &self,
        options: PreAuthenticatedUrlOptions,
    ) -> Result<Url, ClientError> {
        self.ensure_configured()?;
        self.backend
            .enter(
                Op::MakePreAuthenticatedUrl,
                self.client_id(),
                Some(format!("{} {}", options.client_id, options.redirect_uri)),
            )
            .await?;
        if !self.settings.pre_authenticated_url_enabled {
            return Err(ClientError::PreAuthenticatedUrlNotAllowed(
                "pre-authenticated url is not enabled".into(),
            ));
        }
        let user = self.require_session()?;

        let mut url = Url::parse(&self.settings.endpoint)
            .and_then(|base| base.join("/oauth2/authorize"))
            .map_err(|e| ClientError::Other(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &options.client_id)
                .append_pair("redirect_uri", &options.redirect_uri)
                .append_pair("prompt", "none")
                .append_pair("x_pre_authenticated_url_token", &format!("pat-{}", user.sub));
            if let Some(state) = &options.state {
                query.append_pair("state", state);
            }
        }
        Ok(url)
    }

    async fn social_auth_callback(
        &self,
        code: String,
        state: String,
    ) -> Result<(), ClientError> {
        self.backend
            .enter(Op::SocialCallback, self.client_id(), Some(format!("{code} {state}")))
            .await?;
        self.social_result.notify_one();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Platform and social bridge
// ---------------------------------------------------------------------------

/// A [`Platform`] with switchable capability flags that records every URL
/// it is asked to open.
#[derive(Debug, Clone)]
pub struct ScriptedPlatform {
    backend: ScriptedBackend,
    biometric_capable: bool,
    app2app_capable: bool,
}

impl ScriptedPlatform {
    /// A platform with every capability present.
    pub fn new(backend: ScriptedBackend) -> Self {
        Self {
            backend,
            biometric_capable: true,
            app2app_capable: true,
        }
    }

    pub fn with_biometric(mut self, capable: bool) -> Self {
        self.biometric_capable = capable;
        self
    }

    pub fn with_app2app(mut self, capable: bool) -> Self {
        self.app2app_capable = capable;
        self
    }
}

impl Platform for ScriptedPlatform {
    fn biometric_capable(&self) -> bool {
        self.biometric_capable
    }

    fn app2app_capable(&self) -> bool {
        self.app2app_capable
    }

    async fn open_authorization_url(
        &self,
        url: Url,
        redirect_uri: String,
    ) -> Result<(), ClientError> {
        let client_id = url
            .query_pairs()
            .find(|(k, _)| k == "client_id")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        Url::parse(&redirect_uri).map_err(|e| ClientError::Other(e.to_string()))?;
        self.backend
            .enter(Op::OpenAuthorizationUrl, &client_id, Some(url.to_string()))
            .await
    }
}

/// A [`SocialAuthBridge`] that records requested states.
#[derive(Debug, Clone)]
pub struct RecordingSocialBridge {
    backend: ScriptedBackend,
}

impl RecordingSocialBridge {
    pub fn new(backend: ScriptedBackend) -> Self {
        Self { backend }
    }

    /// States passed to `send_auth_request`, oldest first.
    pub fn requested_states(&self) -> Vec<String> {
        self.backend
            .calls_of(Op::SendSocialRequest)
            .into_iter()
            .filter_map(|c| c.detail)
            .collect()
    }
}

impl SocialAuthBridge for RecordingSocialBridge {
    fn send_auth_request(&self, state: &str) -> Result<(), ClientError> {
        self.backend
            .enter_sync(Op::SendSocialRequest, "", Some(state.to_string()))
    }
}
