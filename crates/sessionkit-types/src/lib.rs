//! Data model for sessionkit.
//!
//! This crate defines the values that flow between the orchestrator, its
//! controllers, and the external auth client:
//!
//! - **Session lifecycle** ([`SessionState`], [`SessionStateChangeReason`])
//! - **Identity** ([`UserInfo`], [`AuthResult`])
//! - **Command options** ([`AuthenticateOptions`], [`ReauthenticateOptions`],
//!   [`PromoteOptions`], [`PreAuthenticatedUrlOptions`], [`BiometricPrompt`])
//! - **Persisted configuration** ([`Configuration`])
//! - **App2app requests** ([`App2AppRequest`]) parsed from inbound deep links
//!
//! # Architecture
//!
//! ```text
//! Orchestrator (commands, observers)
//!     ↕
//! Client contracts (AuthClient, ConfigStore, Platform)
//!     ↕
//! Types (this crate)  ← plain data, no I/O
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod app2app;
mod config;
mod error;
mod options;
mod state;
mod user;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use app2app::{App2AppRequest, CODE_CHALLENGE_METHOD};
pub use config::{Configuration, TokenStorageKind, UiVariant};
pub use error::TypesError;
pub use options::{
    AllowedAuthenticators, AuthenticateOptions, BiometricPrompt,
    PreAuthenticatedUrlOptions, PromoteOptions, ReauthenticateOptions,
};
pub use state::{SessionState, SessionStateChangeReason};
pub use user::{AuthResult, UserInfo};
