//! Error taxonomy shared by every operation.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::crypt::CryptError;
use crate::torrent_client::TorrentClientError;

/// Coarse classification of a failure, stable across operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Remote unreachable or the connection broke.
    Transport,
    /// Credentials rejected.
    Auth,
    /// Nothing matched (search hit, job, torrent).
    NotFound,
    /// Malformed input.
    Validation,
    /// Key or token mismatch.
    Crypto,
    /// A bounded wait ran out.
    Timeout,
    Cancelled,
    /// The remote answered with an error of its own.
    Remote,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Auth => "auth",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::Crypto => "crypto",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Remote => "remote",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&TorrentClientError> for ErrorKind {
    fn from(err: &TorrentClientError) -> Self {
        match err {
            TorrentClientError::ConnectionFailed(_) | TorrentClientError::Timeout => {
                ErrorKind::Transport
            }
            TorrentClientError::AuthenticationFailed(_) => ErrorKind::Auth,
            TorrentClientError::NotFound(_) => ErrorKind::NotFound,
            TorrentClientError::InvalidTorrent(_) => ErrorKind::Validation,
            TorrentClientError::Rejected(_)
            | TorrentClientError::ApiError(_)
            | TorrentClientError::Internal(_) => ErrorKind::Remote,
        }
    }
}

/// Failure of one of the front-end operations.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("Search failed: {0}")]
    SearchFailed(#[source] TorrentClientError),

    #[error("Search still running after {cycles} status checks")]
    SearchTimedOut { cycles: u32 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("No results found for '{pattern}'")]
    NoResults { pattern: String },

    #[error("Adding torrent failed: {0}")]
    AddFailed(#[source] TorrentClientError),

    #[error("Purge failed: {0}")]
    PurgeFailed(#[source] TorrentClientError),

    #[error("Remote call failed: {0}")]
    Remote(#[source] TorrentClientError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    Crypto(#[from] CryptError),
}

impl OperationError {
    /// Classify the failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OperationError::SearchFailed(e)
            | OperationError::AddFailed(e)
            | OperationError::PurgeFailed(e)
            | OperationError::Remote(e) => ErrorKind::from(e),
            OperationError::SearchTimedOut { .. } => ErrorKind::Timeout,
            OperationError::Cancelled => ErrorKind::Cancelled,
            OperationError::NoResults { .. } => ErrorKind::NotFound,
            OperationError::Validation(_) => ErrorKind::Validation,
            OperationError::Crypto(_) => ErrorKind::Crypto,
        }
    }
}
