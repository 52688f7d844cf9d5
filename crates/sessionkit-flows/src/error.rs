//! Error types for the flow layer.

use sessionkit_client::ClientError;

/// Errors that can occur while driving a flow.
///
/// Everything except [`FlowError::Client`] is a precondition the flow
/// checked itself; those are shown to the user with their message as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    /// The platform cannot verify app-to-app links.
    #[error("app2app is not supported on this platform")]
    App2AppUnsupported,

    /// App2app approval needs a signed-in user.
    #[error("must be authenticated")]
    NotAuthenticated,

    /// The inbound URI is not an app2app authorization request.
    #[error("unexpected app2app uri")]
    UnexpectedApp2AppUri,

    /// Only one app2app confirmation can be open at a time.
    #[error("app2app confirmation already pending")]
    ConfirmationPending,

    /// The auth client, platform, or social bridge failed.
    #[error(transparent)]
    Client(#[from] ClientError),
}
