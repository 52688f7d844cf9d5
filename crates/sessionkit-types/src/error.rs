//! Error types for the data model.
//!
//! The only fallible thing in this crate is turning untrusted input (an
//! inbound deep link) into structured data, so the enum is small.

/// Errors that can occur while parsing or validating session data.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// The input is not a valid absolute URI.
    #[error("invalid uri: {0}")]
    InvalidUri(#[from] url::ParseError),

    /// A required query parameter is absent from an app2app request.
    #[error("missing query parameter: {0}")]
    MissingParameter(&'static str),

    /// A configuration value failed validation (e.g. empty client id).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}
