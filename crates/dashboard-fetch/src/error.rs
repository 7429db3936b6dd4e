//! Failure taxonomy of the fetch layer.

use thiserror::Error;

/// How a failure should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network drop or non-auth error status. Recoverable by refetch.
    Transient,
    /// Invalid or missing token. Never retried with the same token.
    Authentication,
    /// Response body did not match the expected shape.
    MalformedPayload,
    /// Rejected before anything was sent.
    InvalidRequest,
}

/// Fetch error.
///
/// Cloneable so it can live in hook state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Unauthorized: invalid or expired token")]
    Unauthorized,
    #[error("Not logged in")]
    NotAuthenticated,
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Malformed response: {0}")]
    Decode(String),
    #[error("Invalid request: {0}")]
    Invalid(String),
    #[error("Request cancelled")]
    Cancelled,
}

impl FetchError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized | Self::NotAuthenticated => ErrorKind::Authentication,
            Self::Status { .. } | Self::Network(_) | Self::Cancelled => ErrorKind::Transient,
            Self::Decode(_) => ErrorKind::MalformedPayload,
            Self::Invalid(_) => ErrorKind::InvalidRequest,
        }
    }

    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        self.kind() == ErrorKind::Authentication
    }
}
