//! The single source of truth for [`SessionState`].
//!
//! Nothing sets the state directly. It moves only when:
//! - the current auth client reports a change ([`SessionStateTracker::apply`]), or
//! - a configure starts over with a new client ([`SessionStateTracker::begin_generation`]),
//!   or fails ([`SessionStateTracker::abandon`]).
//!
//! ```text
//!   Unknown ──(configure ok, stored token?)──→ NoSession | Authenticated
//!   NoSession ──(authenticate / reauth / biometric ok)──→ Authenticated
//!   Authenticated ──(logout ok)──→ NoSession
//!   any ──(configure starts / fails)──→ Unknown
//! ```
//!
//! # Client generations
//!
//! Every configure builds a new client and bumps the generation. Each
//! notification carries the generation of the client that sent it, so
//! reports from an abandoned client are rejected instead of clobbering
//! the state of the current one.
//!
//! Like the rest of this crate, the tracker is not thread-safe by itself;
//! it lives on the orchestrator's actor task.

use sessionkit_types::{SessionState, SessionStateChangeReason};
use tracing::{debug, info};

use crate::SessionError;

/// An applied state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: SessionState,
    pub to: SessionState,
    pub reason: SessionStateChangeReason,
}

impl Transition {
    /// Whether the state actually changed (re-authentication reports
    /// Authenticated → Authenticated, for instance).
    pub fn is_change(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Debug, Default)]
pub struct SessionStateTracker {
    state: SessionState,
    last_reason: Option<SessionStateChangeReason>,
    generation: u64,
}

impl SessionStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The reason carried by the last applied notification.
    pub fn last_reason(&self) -> Option<SessionStateChangeReason> {
        self.last_reason
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Starts a new client generation and resets the state to Unknown.
    /// Returns the new generation for tagging the client's messages.
    pub fn begin_generation(&mut self) -> u64 {
        self.generation += 1;
        self.state = SessionState::Unknown;
        self.last_reason = None;
        info!(generation = self.generation, "new client generation");
        self.generation
    }

    /// Drops the current client: bumps the generation so anything it
    /// still reports is stale, and forces the state back to Unknown.
    pub fn abandon(&mut self) {
        self.generation += 1;
        self.state = SessionState::Unknown;
        self.last_reason = None;
        info!(generation = self.generation, "client abandoned");
    }

    /// Applies a notification from the client of `generation`.
    ///
    /// # Errors
    /// [`SessionError::StaleGeneration`] if `generation` is not current.
    /// The state is left untouched.
    pub fn apply(
        &mut self,
        generation: u64,
        state: SessionState,
        reason: SessionStateChangeReason,
    ) -> Result<Transition, SessionError> {
        if generation != self.generation {
            debug!(
                got = generation,
                current = self.generation,
                "dropping notification from abandoned client"
            );
            return Err(SessionError::StaleGeneration {
                got: generation,
                current: self.generation,
            });
        }

        let transition = Transition {
            from: self.state,
            to: state,
            reason,
        };
        self.state = state;
        self.last_reason = Some(reason);
        info!(from = %transition.from, to = %state, ?reason, "session state changed");
        Ok(transition)
    }
}
