//! What observers see: a state snapshot, an event stream, and the outcome
//! of each command.

use sessionkit_flows::App2AppConfirmation;
use sessionkit_session::SurfacedError;
use sessionkit_types::{Configuration, SessionState, SessionStateChangeReason, UserInfo};

/// A snapshot of everything the UI renders.
///
/// Published through a `tokio::sync::watch` channel after every change, so
/// a subscriber always sees the latest complete state rather than a
/// sequence of partial updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionView {
    pub session_state: SessionState,
    /// The configuration the current client was built from (or the one
    /// read from the config store at start-up).
    pub configuration: Configuration,
    /// The current client finished `configure`.
    pub is_configured: bool,
    /// A gated operation is in flight.
    pub is_loading: bool,
    pub user_info: Option<UserInfo>,
    pub access_token: Option<String>,
    pub can_reauthenticate: bool,
    pub biometric_available: bool,
    pub biometric_enabled: bool,
    /// An inbound app2app request waiting for the user's decision.
    pub confirmation: Option<App2AppConfirmation>,
    /// The last surfaced error. Cleared when the next gated operation
    /// starts or the client is reconfigured.
    pub error: Option<SurfacedError>,
}

/// Discrete things that happened, for observers that need every one of
/// them rather than the latest snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The current client finished configuring.
    Configured,
    StateChanged {
        state: SessionState,
        reason: SessionStateChangeReason,
    },
    /// An app2app request needs the user's decision.
    App2AppConfirmationRequested { message: String },
    /// A pre-authenticated URL signed another client in.
    SecondaryAuthenticated { client_id: String, sub: String },
    /// A failure made it past the classifier.
    Error(SurfacedError),
}

/// How a command ended.
///
/// Every command resolves to one of these once the operation it started
/// has completed (or was never started). Failures are also published to
/// the view and event stream; the outcome is for the caller that issued
/// the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Completed,
    /// Parked until the client is configured (app2app only).
    Deferred,
    /// Ignored because another gated operation is in flight.
    Busy,
    /// Nothing to do: re-authentication not allowed, or no open app2app
    /// confirmation.
    NotEligible,
    /// The user cancelled. Nothing was surfaced.
    Cancelled,
    Failed(SurfacedError),
    /// The client was replaced by a reconfigure before this finished; the
    /// result was discarded.
    Superseded,
}

impl CommandOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// The surfaced error, if the command failed.
    pub fn error(&self) -> Option<&SurfacedError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}
