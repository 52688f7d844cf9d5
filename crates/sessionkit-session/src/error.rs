//! Error types for the session layer.

/// Errors raised by the session bookkeeping types.
///
/// Neither variant is a user-facing failure: the orchestrator turns `Busy`
/// into an ignored command and drops stale notifications after logging.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Another gated operation is already in flight.
    #[error("operation {requested} ignored: another operation is in flight")]
    Busy { requested: &'static str },

    /// A notification came from a client that has since been replaced.
    #[error("stale notification from client generation {got} (current {current})")]
    StaleGeneration { got: u64, current: u64 },
}
