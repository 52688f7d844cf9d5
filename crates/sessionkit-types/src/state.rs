//! Session lifecycle types.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The tri-state lifecycle of a session.
///
/// ```text
///                                  Logout / Invalid
///                     +-------------------------------------------+
///                     v                                           |
///  Unknown --NoToken--> NoSession --Authenticated--> Authenticated
///     |                                                    ^
///     +-------------------- FoundToken --------------------+
/// ```
///
/// A freshly built client starts in `Unknown`. Only the auth client's own
/// notifications move a session between states; nothing here is ever
/// inferred from a command's optimistic success.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// The client has not finished configuring, or configure failed.
    #[default]
    Unknown,

    /// Configured, and no usable session exists.
    NoSession,

    /// Configured, and a session with valid tokens exists.
    Authenticated,
}

impl SessionState {
    /// Returns `true` for [`SessionState::Authenticated`].
    pub fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated)
    }

    /// Returns `true` once the state has been resolved by a configure.
    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::NoSession => write!(f, "NoSession"),
            Self::Authenticated => write!(f, "Authenticated"),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionStateChangeReason
// ---------------------------------------------------------------------------

/// Why the session state changed. Think of it as the label on an edge of
/// the diagram on [`SessionState`].
///
/// For example, `NoSession` with `Logout` means the user signed out, while
/// `NoSession` with `Invalid` means the refresh token stopped working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStateChangeReason {
    /// Configure found no stored token.
    NoToken,
    /// Configure found a stored token.
    FoundToken,
    /// An interactive or biometric flow produced a new session.
    Authenticated,
    /// The user logged out.
    Logout,
    /// The stored refresh token was rejected by the server.
    Invalid,
    /// The session was cleared locally.
    Clear,
}

impl fmt::Display for SessionStateChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoToken => "NoToken",
            Self::FoundToken => "FoundToken",
            Self::Authenticated => "Authenticated",
            Self::Logout => "Logout",
            Self::Invalid => "Invalid",
            Self::Clear => "Clear",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_default_is_unknown() {
        assert_eq!(SessionState::default(), SessionState::Unknown);
        assert!(!SessionState::default().is_known());
    }

    #[test]
    fn test_session_state_is_authenticated_only_for_authenticated() {
        assert!(SessionState::Authenticated.is_authenticated());
        assert!(!SessionState::NoSession.is_authenticated());
        assert!(!SessionState::Unknown.is_authenticated());
    }

    #[test]
    fn test_session_state_display() {
        assert_eq!(SessionState::NoSession.to_string(), "NoSession");
        assert_eq!(SessionStateChangeReason::FoundToken.to_string(), "FoundToken");
    }

    #[test]
    fn test_session_state_serializes_snake_case() {
        let json = serde_json::to_string(&SessionState::NoSession).unwrap();
        assert_eq!(json, "\"no_session\"");
    }
}
