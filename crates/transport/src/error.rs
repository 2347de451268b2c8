//! Transport-level error type.

use thiserror::Error;

/// Errors returned by an [`HttpClient`](crate::HttpClient) call.
///
/// The engine uses the variant to classify the task outcome:
/// - `Timeout`: the activation is reported as TIMEDOUT.
/// - anything else: the activation is reported as FAILED.
///
/// Neither outcome is retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete within the client timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The server answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection, protocol or body errors.
    #[error("request failed: {0}")]
    Failed(String),

    /// The resolved request could not be built (bad URL, header, …).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Whether this error should be reported as a timeout rather than a failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Failed(err.to_string())
        }
    }
}
