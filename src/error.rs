//! Error taxonomies for the two remote collaborators.
//!
//! Local failures (content not found, ambiguous matches, malformed oracle
//! output) never surface as errors — they degrade to empty results or
//! reason strings at the component that hit them. Only remote API failures
//! propagate, because they mean the user-visible operation cannot complete.

use thiserror::Error;

/// Errors from the code-hosting API.
///
/// The variants mirror the status classes the orchestrator needs to make
/// retry-vs-abort decisions; everything else collapses into `Api`.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("authentication failed")]
    Unauthorized,
    #[error("permission denied: {0}")]
    Forbidden(String),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl HostError {
    /// Map an HTTP status + body into the taxonomy.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            404 => HostError::NotFound(message),
            401 => HostError::Unauthorized,
            403 => HostError::Forbidden(message),
            _ => HostError::Api { status, message },
        }
    }
}

/// Errors from the text-generation oracle.
///
/// Malformed output is deliberately NOT an error: call sites receive it as
/// [`crate::oracle::OracleResponse::Malformed`] and fall back. This enum
/// only covers transport-level failures.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("oracle error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("oracle returned an empty response")]
    Empty,
}
