//! Walks one session through its lifecycle against the scripted backend:
//! configure, sign in, enable biometric, approve an app2app request, mint
//! a pre-authenticated URL, open the settings page, and log out.
//!
//! Run with `RUST_LOG=debug` to see the orchestrator's own logs.

use sessionkit::prelude::*;
use sessionkit::scripted::{
    RecordingSocialBridge, ScriptedBackend, ScriptedFactory, ScriptedPlatform,
};
use tokio::sync::broadcast;
use tracing::info;

const REDIRECT: &str = "com.example.sessionkit://host/path";

const APP2APP_URI: &str = "https://auth.example/app2app/authorize\
    ?client_id=partner&redirect_uri=com.partner%3A%2F%2Fcb\
    &code_challenge_method=S256&code_challenge=demo-challenge&state=demo";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn report(step: &str, outcome: &CommandOutcome, view: &SessionView) {
    info!(
        step,
        ?outcome,
        state = %view.session_state,
        user = view.user_info.as_ref().map(|u| u.sub.as_str()).unwrap_or("-"),
        biometric = view.biometric_enabled,
        "step finished"
    );
}

fn print_events(rx: &mut broadcast::Receiver<SessionEvent>) {
    while let Ok(event) = rx.try_recv() {
        info!(?event, "event");
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    sessionkit::logging::init_tracing("info,sessionkit=debug")?;

    let backend = ScriptedBackend::new();
    let orchestrator = SessionOrchestrator::builder()
        .redirect_uri(REDIRECT)
        .build(
            ScriptedFactory::new(backend.clone()),
            ScriptedPlatform::new(backend.clone()),
            MemoryConfigStore::default(),
            RecordingSocialBridge::new(backend.clone()),
        )?;
    let mut events = orchestrator.events();

    let mut config = Configuration::new("walkthrough", "https://auth.example");
    config.pre_auth_enabled = true;
    config.pre_auth_client_id = "companion".into();

    let outcome = orchestrator.configure(config).await?;
    report("configure", &outcome, &orchestrator.view());

    let outcome = orchestrator
        .authenticate(AuthenticateOptions::new(REDIRECT))
        .await?;
    report("authenticate", &outcome, &orchestrator.view());

    let outcome = orchestrator.enable_biometric().await?;
    report("enable_biometric", &outcome, &orchestrator.view());

    let outcome = orchestrator.submit_app2app(APP2APP_URI).await?;
    if let Some(confirmation) = orchestrator.view().confirmation {
        info!(message = %confirmation.message, "asking the user");
    }
    report("submit_app2app", &outcome, &orchestrator.view());

    let outcome = orchestrator.confirm_app2app().await?;
    report("confirm_app2app", &outcome, &orchestrator.view());

    let outcome = orchestrator.issue_pre_authenticated_url(None, None).await?;
    report("issue_pre_authenticated_url", &outcome, &orchestrator.view());

    let outcome = orchestrator.open_settings().await?;
    report("open_settings", &outcome, &orchestrator.view());

    let outcome = orchestrator.logout().await?;
    report("logout", &outcome, &orchestrator.view());

    print_events(&mut events);
    orchestrator.shutdown()?;
    Ok(())
}
