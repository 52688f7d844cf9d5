//! Tracing subscriber setup.
//!
//! Libraries only emit `tracing` events; installing a subscriber is the
//! application's call. This helper is what the walkthrough demo uses, and
//! what most apps embedding sessionkit want.

use tracing_subscriber::EnvFilter;

use crate::SessionKitError;

/// Installs a compact fmt subscriber for the whole process.
///
/// `RUST_LOG` wins if it is set; otherwise `default_filter` applies
/// (for example `"info,sessionkit=debug"`).
///
/// # Errors
/// [`SessionKitError::Logging`] if the filter does not parse or a global
/// subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<(), SessionKitError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|e| SessionKitError::Logging(e.to_string()))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init()
        .map_err(|e| SessionKitError::Logging(e.to_string()))
}
