//! The multi-step flows layered on top of a single auth client session.
//!
//! Each controller splits its work in two halves:
//!
//! - **bookkeeping** (`&mut self` methods) that the orchestrator calls on
//!   its actor task, where all session state lives
//! - **network work** (`async` methods taking owned `Arc`s) that the
//!   orchestrator spawns and whose results come back as completions
//!
//! # Key types
//!
//! - [`BiometricController`]: capability check, enable, disable, sign-in
//! - [`App2AppHandoffController`]: inbound cross-app sign-in requests and
//!   their confirmation
//! - [`PreAuthenticatedUrlController`]: mint a pre-authenticated URL and
//!   redeem it with another client

mod app2app;
mod biometric;
mod error;
mod preauth;

pub use app2app::{
    App2AppConfirmation, App2AppHandoffController, PendingApp2AppRequest,
    Submission, approve_request, prepare_confirmation, reject_request,
};
pub use biometric::{BiometricController, BiometricStatus};
pub use error::FlowError;
pub use preauth::{PreAuthOutcome, PreAuthTarget, PreAuthenticatedUrlController};
