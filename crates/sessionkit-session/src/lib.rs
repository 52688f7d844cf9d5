//! Session bookkeeping for sessionkit.
//!
//! This crate holds the three small pieces of state logic the orchestrator
//! is built from:
//!
//! 1. **State tracking**: which [`SessionState`](sessionkit_types::SessionState)
//!    holds right now, driven only by client notifications
//!    ([`SessionStateTracker`])
//! 2. **Single-flight gating**: at most one session-mutating operation in
//!    flight ([`OperationGate`])
//! 3. **Error classification**: turning raw client failures into what a
//!    user should see, or nothing at all ([`ErrorClassifier`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Orchestrator (sessionkit, above)  ← owns one of each, on its actor task
//!     ↕
//! Session Layer (this crate)        ← pure state, no I/O
//!     ↕
//! Client contracts (below)          ← ClientError, the raw failure type
//! ```

mod classify;
mod error;
mod gate;
mod tracker;

pub use classify::{ErrorClassifier, ErrorKind, SurfacedError};
pub use error::SessionError;
pub use gate::{GatePermit, OperationGate};
pub use tracker::{SessionStateTracker, Transition};
