//! Error taxonomy for the tap.
//!
//! Authentication failures are fatal for the whole run. Request and truncation
//! failures are scoped to one partition and go through the configured
//! [`FailurePolicy`](crate::config::FailurePolicy). GraphQL error arrays and
//! null records are not errors at all; they are logged where they occur.

use thiserror::Error;

/// Errors raised while extracting data from the SparkThink API.
#[derive(Error, Debug)]
pub enum TapError {
    /// The auth endpoint answered with a non-success status.
    #[error("authentication failed with status {status}: {body}")]
    Auth { status: u16, body: String },

    /// The auth endpoint answered 2xx but the body was not a usable token.
    #[error("malformed authentication response: {0}")]
    AuthResponse(String),

    /// The auth endpoint could not be reached.
    #[error("authentication request failed: {0}")]
    AuthTransport(String),

    /// A data request failed at the HTTP layer (network, timeout, non-2xx).
    #[error("request for stream '{stream}' ({partition}) failed: {message}")]
    Request {
        stream: String,
        partition: String,
        message: String,
    },

    /// The page ceiling was reached while the server still returned a cursor.
    #[error("retrieval truncated for stream '{stream}' ({partition}) after {pages} pages")]
    Truncated {
        stream: String,
        partition: String,
        pages: usize,
    },

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl TapError {
    /// True for errors that end a single partition rather than the whole run.
    pub fn is_partition_scoped(&self) -> bool {
        matches!(self, TapError::Request { .. } | TapError::Truncated { .. })
    }
}

/// Result type for tap operations.
pub type Result<T> = std::result::Result<T, TapError>;
