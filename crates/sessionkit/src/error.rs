//! Unified error type for sessionkit.

use sessionkit_client::{ClientError, StoreError};
use sessionkit_flows::FlowError;
use sessionkit_session::SessionError;
use sessionkit_types::TypesError;

/// Top-level error that wraps all crate-specific errors.
///
/// Note what is *not* in here: a failed authentication does not come back
/// as a `SessionKitError`. Operation failures are classified and reported
/// through [`CommandOutcome`](crate::CommandOutcome) and the session view.
/// This type covers the orchestrator itself failing: a broken config
/// store, a stopped actor, a logging setup error.
#[derive(Debug, thiserror::Error)]
pub enum SessionKitError {
    /// Invalid configuration or URI.
    #[error(transparent)]
    Types(#[from] TypesError),

    /// An auth client, platform, or social bridge error.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The config store could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Session bookkeeping error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A flow precondition failed.
    #[error(transparent)]
    Flow(#[from] FlowError),

    /// The orchestrator actor has stopped.
    #[error("session orchestrator is unavailable")]
    Unavailable,

    /// The tracing subscriber could not be installed.
    #[error("failed to initialize logging: {0}")]
    Logging(String),
}
