//! Integration tests for the session orchestrator, driven end to end
//! against the scripted backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use sessionkit::prelude::*;
use sessionkit::{
    AuthClientFactory, ClientError, ClientHooks, ClientSettings, JsonFileConfigStore,
};
use sessionkit_client::scripted::{
    Op, RecordingSocialBridge, ScriptedBackend, ScriptedClient, ScriptedFactory,
    ScriptedPlatform,
};
use tokio::sync::broadcast;

const REDIRECT: &str = "com.example.app://host/path";

const APP2APP_URI: &str = "https://app.example/app2app/authorize\
    ?client_id=other&redirect_uri=com.other%3A%2F%2Fcb\
    &code_challenge_method=S256&code_challenge=abc&state=xyz";

// =========================================================================
// Helpers
// =========================================================================

fn config() -> Configuration {
    Configuration::new("app", "https://auth.example")
}

fn start(backend: &ScriptedBackend) -> SessionOrchestrator {
    start_with(backend, ScriptedPlatform::new(backend.clone()), MemoryConfigStore::default())
}

fn start_with<S: ConfigStore>(
    backend: &ScriptedBackend,
    platform: ScriptedPlatform,
    store: S,
) -> SessionOrchestrator {
    SessionOrchestrator::builder()
        .redirect_uri(REDIRECT)
        .build(
            ScriptedFactory::new(backend.clone()),
            platform,
            store,
            RecordingSocialBridge::new(backend.clone()),
        )
        .unwrap()
}

/// Starts an orchestrator and configures it.
async fn configured(backend: &ScriptedBackend) -> SessionOrchestrator {
    let orch = start(backend);
    assert_eq!(orch.configure(config()).await.unwrap(), CommandOutcome::Completed);
    orch
}

/// Starts an orchestrator, configures it, and signs in.
async fn signed_in(backend: &ScriptedBackend) -> SessionOrchestrator {
    let orch = configured(backend).await;
    assert_eq!(
        orch.authenticate(AuthenticateOptions::default()).await.unwrap(),
        CommandOutcome::Completed
    );
    orch
}

/// Builds scripted clients and keeps the hooks of the last one built, so a
/// test can play notifications from a client the orchestrator dropped.
struct HooksKeepingFactory {
    inner: ScriptedFactory,
    kept: Arc<Mutex<Option<ClientHooks>>>,
}

impl AuthClientFactory for HooksKeepingFactory {
    type Client = ScriptedClient;

    fn build(
        &self,
        settings: ClientSettings,
        hooks: ClientHooks,
    ) -> Result<ScriptedClient, ClientError> {
        *self.kept.lock().unwrap() = Some(hooks.clone());
        self.inner.build(settings, hooks)
    }
}

/// Events received so far, without waiting.
fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

/// Waits for the first event matching `pred`.
async fn wait_event(
    rx: &mut broadcast::Receiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.unwrap();
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

// =========================================================================
// Configure
// =========================================================================

#[tokio::test]
async fn test_configure_without_stored_token_reports_no_session() {
    let backend = ScriptedBackend::new();
    let orch = start(&backend);
    let mut events = orch.events();

    let outcome = orch.configure(config()).await.unwrap();

    assert_eq!(outcome, CommandOutcome::Completed);
    let view = orch.view();
    assert!(view.is_configured);
    assert!(!view.is_loading);
    assert_eq!(view.session_state, SessionState::NoSession);
    assert_eq!(view.configuration, config());
    assert_eq!(
        drain(&mut events),
        vec![
            SessionEvent::StateChanged {
                state: SessionState::NoSession,
                reason: SessionStateChangeReason::NoToken,
            },
            SessionEvent::Configured,
        ]
    );
}

#[tokio::test]
async fn test_configure_with_stored_token_restores_session() {
    let backend = ScriptedBackend::new();
    backend.store_session("app", UserInfo::new("returning"));

    let orch = configured(&backend).await;

    let view = orch.view();
    assert_eq!(view.session_state, SessionState::Authenticated);
    assert_eq!(view.access_token.as_deref(), Some("at-returning"));
    assert!(view.can_reauthenticate);
}

#[tokio::test]
async fn test_configure_invalid_configuration_fails_before_building_client() {
    let backend = ScriptedBackend::new();
    let orch = start(&backend);

    let outcome = orch
        .configure(Configuration::new("", "https://auth.example"))
        .await
        .unwrap();

    let err = outcome.error().expect("should fail");
    assert_eq!(err.kind, ErrorKind::Generic);
    assert!(err.message.contains("client_id"));
    assert_eq!(backend.count(Op::Build), 0);
    assert!(!orch.view().is_configured);
}

#[tokio::test]
async fn test_configure_failure_leaves_state_unknown() {
    let backend = ScriptedBackend::new();
    backend.fail_next(Op::Configure, ClientError::Network("offline".into()));
    let orch = start(&backend);

    let outcome = orch.configure(config()).await.unwrap();

    assert_eq!(outcome.error().map(|e| e.kind), Some(ErrorKind::Generic));
    let view = orch.view();
    assert_eq!(view.session_state, SessionState::Unknown);
    assert!(!view.is_configured);
    assert!(view.error.is_some());

    // Nothing usable was left behind.
    let outcome = orch.authenticate(AuthenticateOptions::default()).await.unwrap();
    assert_eq!(outcome.error().map(|e| e.kind), Some(ErrorKind::Generic));
    assert_eq!(backend.count(Op::Authenticate), 0);
}

#[tokio::test]
async fn test_late_notification_from_failed_client_is_ignored() {
    let backend = ScriptedBackend::new();
    backend.fail_next(Op::Configure, ClientError::Network("offline".into()));
    let kept = Arc::new(Mutex::new(None));
    let orch = SessionOrchestrator::builder()
        .redirect_uri(REDIRECT)
        .build(
            HooksKeepingFactory {
                inner: ScriptedFactory::new(backend.clone()),
                kept: Arc::clone(&kept),
            },
            ScriptedPlatform::new(backend.clone()),
            MemoryConfigStore::default(),
            RecordingSocialBridge::new(backend.clone()),
        )
        .unwrap();
    let mut events = orch.events();

    let outcome = orch.configure(config()).await.unwrap();
    assert!(outcome.error().is_some());

    let hooks = kept.lock().unwrap().clone().expect("a client was built");
    hooks.notify_state(SessionState::Authenticated, SessionStateChangeReason::FoundToken);
    // The notification is queued ahead of this command.
    orch.logout().await.unwrap();

    let view = orch.view();
    assert_eq!(view.session_state, SessionState::Unknown);
    assert!(!view.is_configured);
    assert!(!drain(&mut events).iter().any(|e| matches!(
        e,
        SessionEvent::StateChanged {
            state: SessionState::Authenticated,
            ..
        }
    )));
}

#[tokio::test]
async fn test_configure_round_trips_through_config_store() {
    let backend = ScriptedBackend::new();
    let store = MemoryConfigStore::default();
    let mut cfg = config();
    cfg.pre_auth_enabled = true;
    cfg.pre_auth_client_id = "web".into();
    cfg.transient_session = true;

    let first = start_with(&backend, ScriptedPlatform::new(backend.clone()), store.clone());
    first.configure(cfg.clone()).await.unwrap();

    let fresh_backend = ScriptedBackend::new();
    let second = start_with(
        &fresh_backend,
        ScriptedPlatform::new(fresh_backend.clone()),
        store,
    );

    assert_eq!(second.view().configuration, cfg);
    assert!(!second.view().is_configured);
    // Read from the store alone: no client was built.
    assert!(fresh_backend.calls().is_empty());
}

#[tokio::test]
async fn test_configure_persists_to_json_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let backend = ScriptedBackend::new();
    let mut cfg = config();
    cfg.app2app_endpoint = "https://app.example/app2app".into();

    let first = start_with(
        &backend,
        ScriptedPlatform::new(backend.clone()),
        JsonFileConfigStore::open(dir.path(), "default").unwrap(),
    );
    first.configure(cfg.clone()).await.unwrap();
    first.shutdown().unwrap();

    let second = start_with(
        &backend,
        ScriptedPlatform::new(backend.clone()),
        JsonFileConfigStore::open(dir.path(), "default").unwrap(),
    );
    assert_eq!(second.view().configuration, cfg);
}

#[tokio::test]
async fn test_reconfigure_clears_previous_session() {
    let backend = ScriptedBackend::new();
    let orch = signed_in(&backend).await;
    let mut events = orch.events();

    orch.configure(Configuration::new("other", "https://auth.example"))
        .await
        .unwrap();

    let view = orch.view();
    assert_eq!(view.session_state, SessionState::NoSession);
    assert!(view.user_info.is_none());
    assert!(view.access_token.is_none());
    assert_eq!(
        drain(&mut events).first(),
        Some(&SessionEvent::StateChanged {
            state: SessionState::Unknown,
            reason: SessionStateChangeReason::Clear,
        })
    );
}

// =========================================================================
// Authentication lifecycle
// =========================================================================

#[tokio::test]
async fn test_configure_authenticate_logout_scenario() {
    let backend = ScriptedBackend::new();
    let orch = start(&backend);
    let mut events = orch.events();

    orch.configure(config()).await.unwrap();
    let outcome = orch.authenticate(AuthenticateOptions::default()).await.unwrap();
    assert_eq!(outcome, CommandOutcome::Completed);

    let view = orch.view();
    assert_eq!(view.session_state, SessionState::Authenticated);
    assert_eq!(view.user_info.as_ref().map(|u| u.sub.as_str()), Some("user-1"));
    assert_eq!(view.access_token.as_deref(), Some("at-user-1"));
    // The empty redirect was filled in from the settings.
    assert_eq!(
        backend.calls_of(Op::Authenticate)[0].detail.as_deref(),
        Some(REDIRECT)
    );

    let outcome = orch.logout().await.unwrap();
    assert_eq!(outcome, CommandOutcome::Completed);

    let view = orch.view();
    assert_eq!(view.session_state, SessionState::NoSession);
    assert!(view.user_info.is_none());
    assert!(view.access_token.is_none());
    assert!(!view.can_reauthenticate);
    assert_eq!(
        drain(&mut events),
        vec![
            SessionEvent::StateChanged {
                state: SessionState::NoSession,
                reason: SessionStateChangeReason::NoToken,
            },
            SessionEvent::Configured,
            SessionEvent::StateChanged {
                state: SessionState::Authenticated,
                reason: SessionStateChangeReason::Authenticated,
            },
            SessionEvent::StateChanged {
                state: SessionState::NoSession,
                reason: SessionStateChangeReason::Logout,
            },
        ]
    );
}

#[tokio::test]
async fn test_failed_authenticate_does_not_change_state() {
    let backend = ScriptedBackend::new();
    let orch = configured(&backend).await;
    backend.fail_next(Op::Authenticate, ClientError::Network("offline".into()));

    let outcome = orch.authenticate(AuthenticateOptions::default()).await.unwrap();

    assert!(matches!(outcome, CommandOutcome::Failed(_)));
    let view = orch.view();
    assert_eq!(view.session_state, SessionState::NoSession);
    assert_eq!(view.error.as_ref().map(|e| e.kind), Some(ErrorKind::Generic));
    assert!(!view.is_loading);
}

#[tokio::test]
async fn test_cancelled_operation_is_never_surfaced() {
    let backend = ScriptedBackend::new();
    let orch = configured(&backend).await;
    let mut events = orch.events();
    backend.fail_next(Op::Authenticate, ClientError::Cancelled);

    let outcome = orch.authenticate(AuthenticateOptions::default()).await.unwrap();

    assert_eq!(outcome, CommandOutcome::Cancelled);
    assert!(orch.view().error.is_none());
    assert!(
        !drain(&mut events)
            .iter()
            .any(|e| matches!(e, SessionEvent::Error(_)))
    );
}

#[tokio::test]
async fn test_next_gated_operation_clears_previous_error() {
    let backend = ScriptedBackend::new();
    let orch = configured(&backend).await;
    backend.fail_next(Op::Authenticate, ClientError::Network("offline".into()));
    orch.authenticate(AuthenticateOptions::default()).await.unwrap();
    assert!(orch.view().error.is_some());

    orch.authenticate(AuthenticateOptions::default()).await.unwrap();

    assert!(orch.view().error.is_none());
}

#[tokio::test]
async fn test_operation_in_flight_turns_away_second_command() {
    let backend = ScriptedBackend::new();
    let orch = configured(&backend).await;
    let latch = backend.hold(Op::Authenticate);

    let first = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.authenticate(AuthenticateOptions::default()).await })
    };
    assert!(backend.wait_for(Op::Authenticate, 1).await);
    assert!(orch.view().is_loading);

    assert_eq!(orch.logout().await.unwrap(), CommandOutcome::Busy);
    assert_eq!(
        orch.authenticate(AuthenticateOptions::default()).await.unwrap(),
        CommandOutcome::Busy
    );
    assert_eq!(backend.count(Op::Logout), 0);
    assert_eq!(backend.count(Op::Authenticate), 1);

    latch.release();
    assert_eq!(first.await.unwrap().unwrap(), CommandOutcome::Completed);
    assert!(!orch.view().is_loading);
    assert_eq!(orch.logout().await.unwrap(), CommandOutcome::Completed);
}

#[tokio::test]
async fn test_configure_while_operation_in_flight_is_busy() {
    let backend = ScriptedBackend::new();
    let orch = configured(&backend).await;
    let latch = backend.hold(Op::Authenticate);

    let first = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.authenticate(AuthenticateOptions::default()).await })
    };
    assert!(backend.wait_for(Op::Authenticate, 1).await);

    let outcome = orch
        .configure(Configuration::new("other", "https://auth.example"))
        .await
        .unwrap();

    assert_eq!(outcome, CommandOutcome::Busy);
    assert_eq!(backend.count(Op::Build), 1);
    assert_eq!(orch.view().configuration, config());

    latch.release();
    assert_eq!(first.await.unwrap().unwrap(), CommandOutcome::Completed);
    assert_eq!(orch.view().session_state, SessionState::Authenticated);
}

#[tokio::test]
async fn test_ungated_commands_run_while_operation_in_flight() {
    let backend = ScriptedBackend::new();
    let orch = signed_in(&backend).await;
    assert!(orch.enable_biometric().await.unwrap().is_completed());
    let latch = backend.hold(Op::Authenticate);

    let first = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.authenticate(AuthenticateOptions::default()).await })
    };
    assert!(backend.wait_for(Op::Authenticate, 2).await);
    assert!(orch.view().is_loading);

    assert_eq!(orch.fetch_user_info().await.unwrap(), CommandOutcome::Completed);
    assert_eq!(orch.disable_biometric().await.unwrap(), CommandOutcome::Completed);
    assert_eq!(orch.open_settings().await.unwrap(), CommandOutcome::Completed);
    assert!(!orch.view().biometric_enabled);
    assert!(orch.view().is_loading);

    latch.release();
    assert_eq!(first.await.unwrap().unwrap(), CommandOutcome::Completed);
    assert!(!orch.view().is_loading);
}

#[tokio::test]
async fn test_anonymous_then_promote_keeps_subject() {
    let backend = ScriptedBackend::new();
    let orch = configured(&backend).await;

    orch.authenticate_anonymously().await.unwrap();
    assert_eq!(
        orch.view().user_info.map(|u| u.is_anonymous),
        Some(true)
    );

    let outcome = orch
        .promote_anonymous(PromoteOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome, CommandOutcome::Completed);
    let user = orch.view().user_info.unwrap();
    assert_eq!(user.sub, "anon-app");
    assert!(!user.is_anonymous);
}

#[tokio::test]
async fn test_reauthenticate_not_allowed_by_token_is_not_eligible() {
    let backend = ScriptedBackend::new();
    let mut user = UserInfo::new("u");
    user.can_reauthenticate = false;
    backend.set_user(user);
    let orch = signed_in(&backend).await;

    let outcome = orch
        .reauthenticate(ReauthenticateOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome, CommandOutcome::NotEligible);
    assert_eq!(backend.count(Op::RefreshIdToken), 1);
    assert_eq!(backend.count(Op::Reauthenticate), 0);
    assert!(orch.view().error.is_none());
}

#[tokio::test]
async fn test_reauthenticate_refreshes_token_first() {
    let backend = ScriptedBackend::new();
    let orch = signed_in(&backend).await;

    let outcome = orch
        .reauthenticate(ReauthenticateOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome, CommandOutcome::Completed);
    let ops: Vec<Op> = backend
        .calls()
        .into_iter()
        .map(|c| c.op)
        .filter(|op| matches!(op, Op::RefreshIdToken | Op::Reauthenticate))
        .collect();
    assert_eq!(ops, vec![Op::RefreshIdToken, Op::Reauthenticate]);
}

#[tokio::test]
async fn test_fetch_user_info_updates_view() {
    let backend = ScriptedBackend::new();
    backend.store_session("app", UserInfo::new("stored"));
    let orch = configured(&backend).await;
    assert!(orch.view().user_info.is_none());

    let outcome = orch.fetch_user_info().await.unwrap();

    assert_eq!(outcome, CommandOutcome::Completed);
    assert_eq!(orch.view().user_info.map(|u| u.sub), Some("stored".into()));
}

#[tokio::test]
async fn test_completion_from_replaced_client_is_superseded() {
    let backend = ScriptedBackend::new();
    let orch = signed_in(&backend).await;
    let latch = backend.hold(Op::FetchUserInfo);

    let fetch = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.fetch_user_info().await })
    };
    assert!(backend.wait_for(Op::FetchUserInfo, 1).await);

    orch.configure(Configuration::new("other", "https://auth.example"))
        .await
        .unwrap();
    latch.release();

    assert_eq!(fetch.await.unwrap().unwrap(), CommandOutcome::Superseded);
    assert!(orch.view().user_info.is_none());
    assert_eq!(orch.view().session_state, SessionState::NoSession);
}

#[tokio::test]
async fn test_command_before_configure_fails_not_configured() {
    let backend = ScriptedBackend::new();
    let orch = start(&backend);

    let outcome = orch.logout().await.unwrap();

    let err = outcome.error().expect("should fail");
    assert_eq!(err.kind, ErrorKind::Generic);
    assert_eq!(err.message, "client is not configured");
}

// =========================================================================
// Social login
// =========================================================================

#[tokio::test]
async fn test_social_login_round_trips_through_bridge() {
    let backend = ScriptedBackend::new();
    let orch = configured(&backend).await;
    let bridge = RecordingSocialBridge::new(backend.clone());

    let auth = {
        let orch = orch.clone();
        tokio::spawn(async move {
            let mut options = AuthenticateOptions::new(REDIRECT);
            options.state = Some("s-1".into());
            options.social_redirect_uri = Some("com.example.app://social".into());
            orch.authenticate(options).await
        })
    };
    assert!(backend.wait_for(Op::SendSocialRequest, 1).await);
    assert_eq!(bridge.requested_states(), vec!["s-1".to_string()]);

    // Not gated: delivered while the authenticate is still in flight.
    let outcome = orch.deliver_social_result("code-1", "s-1").await.unwrap();
    assert_eq!(outcome, CommandOutcome::Completed);

    assert_eq!(auth.await.unwrap().unwrap(), CommandOutcome::Completed);
    assert_eq!(orch.view().session_state, SessionState::Authenticated);
}

// =========================================================================
// Biometric
// =========================================================================

#[tokio::test]
async fn test_enable_biometric_on_incapable_platform_fails_without_enabling() {
    let backend = ScriptedBackend::new();
    let orch = start_with(
        &backend,
        ScriptedPlatform::new(backend.clone()).with_biometric(false),
        MemoryConfigStore::default(),
    );
    orch.configure(config()).await.unwrap();
    orch.authenticate(AuthenticateOptions::default()).await.unwrap();

    let outcome = orch.enable_biometric().await.unwrap();

    let err = outcome.error().expect("should fail");
    assert_eq!(err.kind, ErrorKind::BiometricUnsupportedOrDenied);
    assert_eq!(
        err.message,
        ErrorKind::BiometricUnsupportedOrDenied.remediation().unwrap()
    );
    let view = orch.view();
    assert!(!view.biometric_available);
    assert!(!view.biometric_enabled);
    assert_eq!(backend.count(Op::EnableBiometric), 0);
}

#[tokio::test]
async fn test_enable_biometric_without_enrollment_is_classified() {
    let backend = ScriptedBackend::new();
    backend.set_biometric_support(Err(ClientError::BiometricNoEnrollment));
    let orch = signed_in(&backend).await;

    let outcome = orch.enable_biometric().await.unwrap();

    assert_eq!(
        outcome.error().map(|e| e.kind),
        Some(ErrorKind::BiometricNotEnrolled)
    );
    assert!(!orch.view().biometric_enabled);
}

#[tokio::test]
async fn test_biometric_enable_sign_in_disable() {
    let backend = ScriptedBackend::new();
    let orch = signed_in(&backend).await;
    assert!(orch.view().biometric_available);
    assert!(!orch.view().biometric_enabled);

    assert!(orch.enable_biometric().await.unwrap().is_completed());
    assert!(orch.view().biometric_enabled);
    assert_eq!(
        backend.calls_of(Op::EnableBiometric)[0].detail.as_deref(),
        Some("Biometric Authentication")
    );

    assert!(orch.authenticate_biometric().await.unwrap().is_completed());
    assert_eq!(orch.view().session_state, SessionState::Authenticated);

    assert!(orch.disable_biometric().await.unwrap().is_completed());
    assert!(!orch.view().biometric_enabled);
}

#[tokio::test]
async fn test_biometric_sign_in_without_key_reports_invalidated_key() {
    let backend = ScriptedBackend::new();
    let orch = signed_in(&backend).await;

    let outcome = orch.authenticate_biometric().await.unwrap();

    assert_eq!(
        outcome.error().map(|e| e.kind),
        Some(ErrorKind::BiometricKeyInvalidated)
    );
}

#[tokio::test]
async fn test_logout_disables_biometric() {
    let backend = ScriptedBackend::new();
    let orch = signed_in(&backend).await;
    orch.enable_biometric().await.unwrap();

    orch.logout().await.unwrap();

    assert!(!orch.view().biometric_enabled);
}

// =========================================================================
// App2app
// =========================================================================

#[tokio::test]
async fn test_app2app_without_session_fails_without_confirmation() {
    let backend = ScriptedBackend::new();
    let orch = configured(&backend).await;

    let outcome = orch.submit_app2app(APP2APP_URI).await.unwrap();

    let err = outcome.error().expect("should fail");
    assert_eq!(err.message, "must be authenticated");
    assert!(orch.view().confirmation.is_none());
    assert_eq!(backend.count(Op::FetchUserInfo), 0);
}

#[tokio::test]
async fn test_app2app_on_incapable_platform_fails() {
    let backend = ScriptedBackend::new();
    let orch = start_with(
        &backend,
        ScriptedPlatform::new(backend.clone()).with_app2app(false),
        MemoryConfigStore::default(),
    );
    orch.configure(config()).await.unwrap();
    orch.authenticate(AuthenticateOptions::default()).await.unwrap();

    let outcome = orch.submit_app2app(APP2APP_URI).await.unwrap();

    assert_eq!(
        outcome.error().map(|e| e.message.as_str()),
        Some("app2app is not supported on this platform")
    );
}

#[tokio::test]
async fn test_app2app_malformed_uri_fails() {
    let backend = ScriptedBackend::new();
    let orch = signed_in(&backend).await;

    let outcome = orch
        .submit_app2app("https://app.example/app2app/authorize?client_id=x")
        .await
        .unwrap();

    assert_eq!(
        outcome.error().map(|e| e.message.as_str()),
        Some("unexpected app2app uri")
    );
}

#[tokio::test]
async fn test_app2app_confirm_approves_request() {
    let backend = ScriptedBackend::new();
    let orch = signed_in(&backend).await;
    let mut events = orch.events();

    let outcome = orch.submit_app2app(APP2APP_URI).await.unwrap();
    assert_eq!(outcome, CommandOutcome::Completed);

    let confirmation = orch.view().confirmation.expect("confirmation open");
    assert!(confirmation.message.contains("user@example.com"));
    assert!(confirmation.message.contains("xyz"));
    assert!(
        drain(&mut events)
            .iter()
            .any(|e| matches!(e, SessionEvent::App2AppConfirmationRequested { .. }))
    );

    assert_eq!(orch.confirm_app2app().await.unwrap(), CommandOutcome::Completed);
    assert!(orch.view().confirmation.is_none());
    let approvals = backend.calls_of(Op::ApproveApp2App);
    assert_eq!(approvals.len(), 1);
    assert_eq!(approvals[0].client_id, "other");
}

#[tokio::test]
async fn test_app2app_cancel_rejects_with_reason() {
    let backend = ScriptedBackend::new();
    let orch = signed_in(&backend).await;
    orch.submit_app2app(APP2APP_URI).await.unwrap();

    assert_eq!(orch.cancel_app2app().await.unwrap(), CommandOutcome::Completed);

    assert!(orch.view().confirmation.is_none());
    let rejections = backend.calls_of(Op::RejectApp2App);
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].detail.as_deref(), Some("User cancelled"));
    assert_eq!(backend.count(Op::ApproveApp2App), 0);
}

#[tokio::test]
async fn test_app2app_second_request_while_confirmation_open_is_rejected() {
    let backend = ScriptedBackend::new();
    let orch = signed_in(&backend).await;
    orch.submit_app2app(APP2APP_URI).await.unwrap();

    let outcome = orch.submit_app2app(APP2APP_URI).await.unwrap();

    assert_eq!(
        outcome.error().map(|e| e.message.as_str()),
        Some("app2app confirmation already pending")
    );
    assert!(orch.view().confirmation.is_some());
}

#[tokio::test]
async fn test_confirm_without_open_confirmation_is_not_eligible() {
    let backend = ScriptedBackend::new();
    let orch = signed_in(&backend).await;

    assert_eq!(orch.confirm_app2app().await.unwrap(), CommandOutcome::NotEligible);
    assert_eq!(orch.cancel_app2app().await.unwrap(), CommandOutcome::NotEligible);
}

#[tokio::test]
async fn test_logout_drops_open_confirmation() {
    let backend = ScriptedBackend::new();
    let orch = signed_in(&backend).await;
    orch.submit_app2app(APP2APP_URI).await.unwrap();

    orch.logout().await.unwrap();

    assert!(orch.view().confirmation.is_none());
    assert_eq!(orch.confirm_app2app().await.unwrap(), CommandOutcome::NotEligible);
}

#[tokio::test]
async fn test_app2app_before_configure_is_processed_exactly_once() {
    let backend = ScriptedBackend::new();
    backend.store_session("app", UserInfo::new("returning"));
    let orch = start(&backend);
    let mut events = orch.events();

    let outcome = orch.submit_app2app(APP2APP_URI).await.unwrap();
    assert_eq!(outcome, CommandOutcome::Deferred);
    assert_eq!(backend.count(Op::FetchUserInfo), 0);

    orch.configure(config()).await.unwrap();
    wait_event(&mut events, |e| {
        matches!(e, SessionEvent::App2AppConfirmationRequested { .. })
    })
    .await;

    // A later state change must not replay the parked request.
    orch.fetch_user_info().await.unwrap();
    orch.reauthenticate(ReauthenticateOptions::default()).await.unwrap();
    assert_eq!(backend.count(Op::FetchUserInfo), 2);
    assert!(orch.view().confirmation.is_some());
}

// =========================================================================
// Pre-authenticated URL
// =========================================================================

#[tokio::test]
async fn test_pre_auth_secondary_leaves_primary_untouched() {
    let backend = ScriptedBackend::new();
    let orch = start(&backend);
    let mut cfg = config();
    cfg.pre_auth_enabled = true;
    orch.configure(cfg).await.unwrap();
    orch.authenticate(AuthenticateOptions::default()).await.unwrap();
    backend.set_user(UserInfo::new("secondary"));
    let mut events = orch.events();

    let outcome = orch
        .issue_pre_authenticated_url(Some("web".into()), None)
        .await
        .unwrap();

    assert_eq!(outcome, CommandOutcome::Completed);
    assert!(drain(&mut events).contains(&SessionEvent::SecondaryAuthenticated {
        client_id: "web".into(),
        sub: "secondary".into(),
    }));
    let view = orch.view();
    assert_eq!(view.session_state, SessionState::Authenticated);
    assert_eq!(view.user_info.map(|u| u.sub), Some("user-1".into()));
    assert_eq!(view.access_token.as_deref(), Some("at-user-1"));
    assert!(!backend.has_stored_session("web"));
}

#[tokio::test]
async fn test_pre_auth_with_configured_redirect_hands_off() {
    let backend = ScriptedBackend::new();
    let orch = start(&backend);
    let mut cfg = config();
    cfg.pre_auth_enabled = true;
    cfg.pre_auth_client_id = "web".into();
    cfg.pre_auth_redirect_uri = "https://web.example/cb".into();
    orch.configure(cfg).await.unwrap();
    orch.authenticate(AuthenticateOptions::default()).await.unwrap();

    let outcome = orch.issue_pre_authenticated_url(None, None).await.unwrap();

    assert_eq!(outcome, CommandOutcome::Completed);
    let opened = backend.calls_of(Op::OpenAuthorizationUrl);
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].client_id, "web");
    // Only the primary client was ever built.
    assert_eq!(backend.count(Op::Build), 1);
}

#[tokio::test]
async fn test_pre_auth_disabled_surfaces_error() {
    let backend = ScriptedBackend::new();
    let orch = signed_in(&backend).await;

    let outcome = orch.issue_pre_authenticated_url(None, None).await.unwrap();

    assert_eq!(outcome.error().map(|e| e.kind), Some(ErrorKind::Generic));
    assert_eq!(backend.count(Op::OpenAuthorizationUrl), 0);
}

// =========================================================================
// Settings page
// =========================================================================

#[tokio::test]
async fn test_open_settings_opens_settings_page_and_keeps_session() {
    let backend = ScriptedBackend::new();
    let orch = signed_in(&backend).await;
    let before = orch.view();

    let outcome = orch.open_settings().await.unwrap();

    assert_eq!(outcome, CommandOutcome::Completed);
    let opened = backend.calls_of(Op::OpenAuthorizationUrl);
    assert_eq!(opened.len(), 1);
    assert_eq!(
        opened[0].detail.as_deref(),
        Some("https://auth.example/settings")
    );
    assert_eq!(orch.view(), before);
}

#[tokio::test]
async fn test_open_settings_before_configure_fails_not_configured() {
    let backend = ScriptedBackend::new();
    let orch = start(&backend);

    let outcome = orch.open_settings().await.unwrap();

    assert_eq!(outcome.error().map(|e| e.kind), Some(ErrorKind::Generic));
    assert_eq!(backend.count(Op::OpenAuthorizationUrl), 0);
}

#[tokio::test]
async fn test_open_settings_dismissed_is_not_surfaced() {
    let backend = ScriptedBackend::new();
    let orch = configured(&backend).await;
    backend.fail_next(Op::OpenAuthorizationUrl, ClientError::Cancelled);

    let outcome = orch.open_settings().await.unwrap();

    assert_eq!(outcome, CommandOutcome::Cancelled);
    assert!(orch.view().error.is_none());
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn test_commands_after_shutdown_are_unavailable() {
    let backend = ScriptedBackend::new();
    let orch = configured(&backend).await;

    orch.shutdown().unwrap();

    assert!(matches!(
        orch.logout().await,
        Err(SessionKitError::Unavailable)
    ));
}

#[tokio::test]
async fn test_subscriber_sees_latest_view() {
    let backend = ScriptedBackend::new();
    let orch = configured(&backend).await;
    let mut rx = orch.subscribe();
    rx.borrow_and_update();

    orch.authenticate(AuthenticateOptions::default()).await.unwrap();

    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow().session_state, SessionState::Authenticated);
}
