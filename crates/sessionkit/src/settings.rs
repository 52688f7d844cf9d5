//! Orchestrator settings: everything that is not persisted configuration.

use sessionkit_types::BiometricPrompt;

/// Settings for one [`SessionOrchestrator`](crate::SessionOrchestrator).
///
/// Unlike [`Configuration`](sessionkit_types::Configuration), these are
/// fixed for the lifetime of the orchestrator and never written to the
/// config store.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Redirect URI for interactive flows, used when a command's options
    /// leave it empty. Also the primary redirect that decides whether a
    /// pre-authenticated URL is handed off.
    pub redirect_uri: String,

    /// The prompt shown when enabling or using biometric sign-in.
    pub biometric_prompt: BiometricPrompt,

    /// Sent back to the requesting app when the user declines an app2app
    /// request.
    pub app2app_reject_reason: String,

    /// Capacity of the event broadcast channel. Slow subscribers that fall
    /// further behind than this lose the oldest events.
    pub event_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            redirect_uri: "com.example.sessionkit://host/path".to_string(),
            biometric_prompt: BiometricPrompt::default(),
            app2app_reject_reason: "User cancelled".to_string(),
            event_capacity: 64,
        }
    }
}
