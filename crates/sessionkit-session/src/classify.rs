//! Normalizes raw client failures into what observers get to see.
//!
//! Clients and platforms report failures at whatever granularity they
//! have: a raw biometric prompt code, an already-wrapped SDK error, an
//! OAuth error response. The classifier folds all of them into one
//! [`ErrorKind`] and decides whether the user should hear about it.
//!
//! | raw failure                                                     | kind                          |
//! |-----------------------------------------------------------------|-------------------------------|
//! | `Cancelled`, prompt `Canceled`/`NegativeButton`/`UserCanceled`  | `Cancelled` (never surfaced)  |
//! | `BiometricPrivateKeyNotFound`                                   | `BiometricKeyInvalidated`     |
//! | check `NoneEnrolled`, prompt `NoBiometrics`                     | `BiometricNotEnrolled`        |
//! | check `HardwareUnavailable`/`NoHardware`/`SecurityUpdateRequired`/`Unsupported`, prompt `HardwareNotPresent`/`HardwareUnavailable`/`SecurityUpdateRequired` | `BiometricUnsupportedOrDenied` |
//! | prompt `NoDeviceCredential`                                     | `BiometricNoDeviceCredential` |
//! | prompt `Lockout`/`LockoutPermanent`                             | `BiometricLockedOut`          |
//! | anything else                                                   | `Generic` (message verbatim)  |
//!
//! Already-wrapped variants (`BiometricNoEnrollment` and friends) map the
//! same way as the raw codes they stand for.

use std::fmt;

use sessionkit_client::{
    BiometricCanAuthenticateCode as Probe, BiometricPromptCode as Prompt,
    ClientError,
};

/// What kind of failure happened, from the user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The user backed out. Never shown.
    Cancelled,
    /// The biometric key was invalidated, usually by a new enrollment.
    BiometricKeyInvalidated,
    /// The device has no biometric enrolled.
    BiometricNotEnrolled,
    /// Biometric is unsupported on this device or permission is missing.
    BiometricUnsupportedOrDenied,
    /// The device has no PIN, pattern, or password.
    BiometricNoDeviceCredential,
    /// Too many failed attempts.
    BiometricLockedOut,
    /// Anything else; the raw message is shown as-is.
    Generic,
}

impl ErrorKind {
    /// Fixed guidance for the biometric kinds, `None` for the others.
    pub fn remediation(self) -> Option<&'static str> {
        match self {
            Self::BiometricKeyInvalidated => Some(
                "Your biometric data has changed since biometric login was set up. \
                 Please sign in again and re-enable biometric login.",
            ),
            Self::BiometricNotEnrolled => Some(
                "No biometric is set up on this device. \
                 Please add a fingerprint or face in the device settings first.",
            ),
            Self::BiometricUnsupportedOrDenied => Some(
                "Biometric login is not supported on this device or the app lacks \
                 permission to use it. Check biometric support before enabling it.",
            ),
            Self::BiometricNoDeviceCredential => Some(
                "This device has no screen lock. \
                 Please set a PIN, pattern or password in the device settings first.",
            ),
            Self::BiometricLockedOut => Some(
                "Biometric login is locked after too many attempts. \
                 Please sign in with your password instead.",
            ),
            Self::Cancelled | Self::Generic => None,
        }
    }

    pub fn is_biometric(self) -> bool {
        self.remediation().is_some()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cancelled => "cancelled",
            Self::BiometricKeyInvalidated => "biometric_key_invalidated",
            Self::BiometricNotEnrolled => "biometric_not_enrolled",
            Self::BiometricUnsupportedOrDenied => "biometric_unsupported_or_denied",
            Self::BiometricNoDeviceCredential => "biometric_no_device_credential",
            Self::BiometricLockedOut => "biometric_locked_out",
            Self::Generic => "generic",
        };
        f.write_str(s)
    }
}

/// An error that made it past the classifier and is shown to observers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SurfacedError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SurfacedError {
    /// A Generic error with the given message.
    pub fn generic(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Generic,
            message: message.into(),
        }
    }
}

/// Stateless mapping from [`ClientError`] to [`ErrorKind`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn classify(&self, error: &ClientError) -> ErrorKind {
        match error {
            ClientError::Cancelled
            | ClientError::BiometricPrompt(
                Prompt::Canceled | Prompt::NegativeButton | Prompt::UserCanceled,
            ) => ErrorKind::Cancelled,

            ClientError::BiometricPrivateKeyNotFound => {
                ErrorKind::BiometricKeyInvalidated
            }

            ClientError::BiometricNotSupportedOrPermissionDenied
            | ClientError::BiometricCanAuthenticate(
                Probe::HardwareUnavailable
                | Probe::NoHardware
                | Probe::SecurityUpdateRequired
                | Probe::Unsupported,
            )
            | ClientError::BiometricPrompt(
                Prompt::HardwareNotPresent
                | Prompt::HardwareUnavailable
                | Prompt::SecurityUpdateRequired,
            ) => ErrorKind::BiometricUnsupportedOrDenied,

            ClientError::BiometricNoEnrollment
            | ClientError::BiometricCanAuthenticate(Probe::NoneEnrolled)
            | ClientError::BiometricPrompt(Prompt::NoBiometrics) => {
                ErrorKind::BiometricNotEnrolled
            }

            ClientError::BiometricNoPasscode
            | ClientError::BiometricPrompt(Prompt::NoDeviceCredential) => {
                ErrorKind::BiometricNoDeviceCredential
            }

            ClientError::BiometricLockout
            | ClientError::BiometricPrompt(
                Prompt::Lockout | Prompt::LockoutPermanent,
            ) => ErrorKind::BiometricLockedOut,

            _ => ErrorKind::Generic,
        }
    }

    /// Classifies `error` and builds what observers should see.
    /// Returns `None` for cancellations.
    pub fn surface(&self, error: &ClientError) -> Option<SurfacedError> {
        let kind = self.classify(error);
        let message = match kind {
            ErrorKind::Cancelled => return None,
            ErrorKind::Generic => error.to_string(),
            biometric => biometric.remediation().unwrap_or_default().to_string(),
        };
        Some(SurfacedError { kind, message })
    }
}
