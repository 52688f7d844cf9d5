//! Raw failures reported by the external collaborators.
//!
//! These are deliberately close to what the underlying SDK and platform
//! report. Turning them into something a user should see is the error
//! classifier's job (in `sessionkit-session`), not this crate's.

use std::fmt;

/// Result of a platform "can this device authenticate with biometrics?"
/// check, when the answer is no.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiometricCanAuthenticateCode {
    HardwareUnavailable,
    NoHardware,
    SecurityUpdateRequired,
    Unsupported,
    NoneEnrolled,
    StatusUnknown,
}

impl fmt::Display for BiometricCanAuthenticateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::HardwareUnavailable => "BIOMETRIC_ERROR_HW_UNAVAILABLE",
            Self::NoHardware => "BIOMETRIC_ERROR_NO_HARDWARE",
            Self::SecurityUpdateRequired => {
                "BIOMETRIC_ERROR_SECURITY_UPDATE_REQUIRED"
            }
            Self::Unsupported => "BIOMETRIC_ERROR_UNSUPPORTED",
            Self::NoneEnrolled => "BIOMETRIC_ERROR_NONE_ENROLLED",
            Self::StatusUnknown => "BIOMETRIC_STATUS_UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Error code delivered by the platform biometric prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiometricPromptCode {
    Canceled,
    NegativeButton,
    UserCanceled,
    HardwareNotPresent,
    HardwareUnavailable,
    SecurityUpdateRequired,
    NoBiometrics,
    NoDeviceCredential,
    Lockout,
    LockoutPermanent,
    Timeout,
    NoSpace,
    Vendor(i32),
}

impl fmt::Display for BiometricPromptCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Canceled => f.write_str("ERROR_CANCELED"),
            Self::NegativeButton => f.write_str("ERROR_NEGATIVE_BUTTON"),
            Self::UserCanceled => f.write_str("ERROR_USER_CANCELED"),
            Self::HardwareNotPresent => f.write_str("ERROR_HW_NOT_PRESENT"),
            Self::HardwareUnavailable => f.write_str("ERROR_HW_UNAVAILABLE"),
            Self::SecurityUpdateRequired => {
                f.write_str("ERROR_SECURITY_UPDATE_REQUIRED")
            }
            Self::NoBiometrics => f.write_str("ERROR_NO_BIOMETRICS"),
            Self::NoDeviceCredential => {
                f.write_str("ERROR_NO_DEVICE_CREDENTIAL")
            }
            Self::Lockout => f.write_str("ERROR_LOCKOUT"),
            Self::LockoutPermanent => f.write_str("ERROR_LOCKOUT_PERMANENT"),
            Self::Timeout => f.write_str("ERROR_TIMEOUT"),
            Self::NoSpace => f.write_str("ERROR_NO_SPACE"),
            Self::Vendor(code) => write!(f, "ERROR_VENDOR({code})"),
        }
    }
}

/// Errors reported by an [`AuthClient`](crate::AuthClient), a
/// [`Platform`](crate::Platform), or a
/// [`SocialAuthBridge`](crate::SocialAuthBridge).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The user abandoned the flow (closed the browser, pressed cancel).
    #[error("cancelled by user")]
    Cancelled,

    /// The biometric private key is gone, typically because a new
    /// biometric was enrolled and the key was invalidated with it.
    #[error("biometric private key not found")]
    BiometricPrivateKeyNotFound,

    /// Raw capability check failure, not yet mapped to a specific cause.
    #[error("biometric cannot authenticate: {0}")]
    BiometricCanAuthenticate(BiometricCanAuthenticateCode),

    /// Raw biometric prompt failure, not yet mapped to a specific cause.
    #[error("biometric prompt failed: {0}")]
    BiometricPrompt(BiometricPromptCode),

    #[error("biometric is not supported or permission is denied")]
    BiometricNotSupportedOrPermissionDenied,

    #[error("no biometric is enrolled")]
    BiometricNoEnrollment,

    #[error("no device passcode is set")]
    BiometricNoPasscode,

    #[error("biometric is locked out")]
    BiometricLockout,

    /// The provider returned an OAuth error response.
    #[error("{}", format_oauth_message(.error, .error_description.as_deref()))]
    OAuth {
        error: String,
        error_description: Option<String>,
        state: Option<String>,
    },

    /// The provider returned a structured API error.
    #[error("{message}")]
    Server {
        name: String,
        reason: String,
        message: String,
    },

    /// The session lacks what it needs to mint a pre-authenticated URL
    /// (feature disabled, missing scope, no device secret, ...).
    #[error("pre-authenticated url not allowed: {0}")]
    PreAuthenticatedUrlNotAllowed(String),

    /// An operation was attempted before `configure` succeeded.
    #[error("client is not configured")]
    NotConfigured,

    /// Transport failure talking to the provider.
    #[error("network error: {0}")]
    Network(String),

    /// Anything else, with the underlying message verbatim.
    #[error("{0}")]
    Other(String),
}

fn format_oauth_message(error: &str, description: Option<&str>) -> String {
    match description {
        Some(d) => format!("{error}: {d}"),
        None => error.to_string(),
    }
}

/// Errors from a [`ConfigStore`](crate::ConfigStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("config store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "json-file")]
    #[error("config store document is malformed: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored value has the wrong type for the requested key.
    #[error("config key {key} does not hold a {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    /// The backing store's lock was poisoned by a panicking writer.
    #[error("config store lock poisoned")]
    Poisoned,
}
