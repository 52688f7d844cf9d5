//! Callbacks a client uses to report back to whoever built it.
//!
//! Instead of a process-wide listener registry, every client is handed its
//! own `ClientHooks` at build time. The orchestrator's hooks post into its
//! command queue tagged with the client generation, so reports from an
//! abandoned client can be told apart and dropped.

use std::fmt;
use std::sync::Arc;

use sessionkit_types::{SessionState, SessionStateChangeReason};

type StateCallback =
    Arc<dyn Fn(SessionState, SessionStateChangeReason) + Send + Sync>;
type SocialCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Session-state and social-login callbacks injected into a client.
///
/// Cheap to clone; clients may call it from any thread.
#[derive(Clone)]
pub struct ClientHooks {
    on_state_change: StateCallback,
    on_social_request: SocialCallback,
}

impl ClientHooks {
    pub fn new(
        on_state_change: impl Fn(SessionState, SessionStateChangeReason)
            + Send
            + Sync
            + 'static,
        on_social_request: impl Fn(String) + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_state_change: Arc::new(on_state_change),
            on_social_request: Arc::new(on_social_request),
        }
    }

    /// Hooks that go nowhere, for clients nobody observes.
    pub fn detached() -> Self {
        Self::new(|_, _| {}, |_| {})
    }

    /// Called by the client whenever its session state changes.
    pub fn notify_state(
        &self,
        state: SessionState,
        reason: SessionStateChangeReason,
    ) {
        (self.on_state_change)(state, reason);
    }

    /// Called by the client when the user picks social login.
    pub fn request_social_auth(&self, state: &str) {
        (self.on_social_request)(state.to_string());
    }
}

impl fmt::Debug for ClientHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHooks").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn test_notify_state_invokes_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let hooks = ClientHooks::new(
            move |state, reason| sink.lock().unwrap().push((state, reason)),
            |_| {},
        );

        hooks.notify_state(
            SessionState::Authenticated,
            SessionStateChangeReason::FoundToken,
        );

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(
                SessionState::Authenticated,
                SessionStateChangeReason::FoundToken
            )]
        );
    }

    #[test]
    fn test_request_social_auth_passes_state() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let hooks = ClientHooks::new(
            |_, _| {},
            move |state| *sink.lock().unwrap() = Some(state),
        );

        hooks.request_social_auth("wx-state");

        assert_eq!(seen.lock().unwrap().as_deref(), Some("wx-state"));
    }

    #[test]
    fn test_detached_hooks_do_nothing() {
        let hooks = ClientHooks::detached();
        hooks.notify_state(SessionState::NoSession, SessionStateChangeReason::Logout);
        hooks.request_social_auth("s");
    }
}
