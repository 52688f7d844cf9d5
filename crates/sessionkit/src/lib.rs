//! # sessionkit
//!
//! Client-side session orchestration for apps that sign users in through
//! an OAuth 2.0 / OIDC auth client.
//!
//! sessionkit does not speak OAuth itself. It sits between the UI and an
//! [`AuthClient`] and owns everything around it: persisting the client
//! configuration, making sure only one session-mutating operation runs at
//! a time, tracking the session state the client reports, turning client
//! failures into what a user should see, and running the multi-step flows
//! (biometric sign-in, app2app approval, pre-authenticated URLs).
//!
//! ## Architecture
//!
//! ```text
//! UI
//!  │ commands                         ▲ SessionView (watch), SessionEvent (broadcast)
//!  ▼                                  │
//! SessionOrchestrator ──mpsc──▶ actor task ── OperationGate, SessionStateTracker,
//!                                  │          ErrorClassifier, flow controllers
//!                                  │ spawned work
//!                                  ▼
//!                 AuthClient · Platform · ConfigStore · SocialAuthBridge
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sessionkit::prelude::*;
//! use sessionkit::scripted::{ScriptedBackend, ScriptedFactory, ScriptedPlatform, RecordingSocialBridge};
//!
//! let backend = ScriptedBackend::new();
//! let orchestrator = SessionOrchestrator::builder()
//!     .redirect_uri("com.example.app://host/path")
//!     .build(
//!         ScriptedFactory::new(backend.clone()),
//!         ScriptedPlatform::new(backend.clone()),
//!         MemoryConfigStore::default(),
//!         RecordingSocialBridge::new(backend),
//!     )?;
//!
//! orchestrator.configure(Configuration::new("app", "https://auth.example")).await?;
//! orchestrator.authenticate(AuthenticateOptions::default()).await?;
//! assert!(orchestrator.view().session_state.is_authenticated());
//! ```
//!
//! ## Feature Flags
//!
//! - `scripted`: re-exports the in-memory scripted backend as
//!   [`scripted`], for demos and tests

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod actor;
mod error;
pub mod logging;
mod orchestrator;
mod settings;
mod view;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use error::SessionKitError;
pub use orchestrator::{SessionOrchestrator, SessionOrchestratorBuilder};
pub use settings::SessionSettings;
pub use view::{CommandOutcome, SessionEvent, SessionView};

pub use sessionkit_client::{
    AuthClient, AuthClientFactory, ClientError, ClientHooks, ClientSettings,
    ConfigStore, ConfigStoreExt, JsonFileConfigStore, MemoryConfigStore, Platform,
    SocialAuthBridge, StoreError,
};
pub use sessionkit_flows::{App2AppConfirmation, FlowError, PreAuthOutcome};
pub use sessionkit_session::{ErrorKind, SurfacedError};
pub use sessionkit_types::{
    AllowedAuthenticators, App2AppRequest, AuthResult, AuthenticateOptions,
    BiometricPrompt, Configuration, PreAuthenticatedUrlOptions, PromoteOptions,
    ReauthenticateOptions, SessionState, SessionStateChangeReason,
    TokenStorageKind, UiVariant, UserInfo,
};

#[cfg(feature = "scripted")]
pub use sessionkit_client::scripted;

/// Everything an embedding app usually needs.
pub mod prelude {
    pub use crate::{
        AuthenticateOptions, BiometricPrompt, CommandOutcome, Configuration,
        ConfigStore, ErrorKind, MemoryConfigStore, PromoteOptions,
        ReauthenticateOptions, SessionEvent, SessionKitError, SessionOrchestrator,
        SessionSettings, SessionState, SessionStateChangeReason, SessionView,
        SurfacedError, UserInfo,
    };
}
