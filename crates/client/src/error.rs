//! Client-side error taxonomy.

use console_core::DomainError;
use thiserror::Error;

/// Everything a console call can fail with.
///
/// Payloads are plain strings so errors can be cloned into reference-list
/// state and shown to the user.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The request never produced an HTTP response.
    #[error("network error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status (after any refresh-retry).
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The refresh-token call failed; credentials have been cleared.
    #[error("session expired: {0}")]
    RefreshFailed(String),

    /// The backend refused the operation (`success: false`); message is verbatim.
    #[error("{message}")]
    Rejected { message: String },

    /// A response could not be decoded.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// A request could not be built (bad URL, bad multipart part).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The operation needs a signed-in session.
    #[error("not signed in")]
    NotAuthenticated,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl ClientError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Whether the caller should route to the signed-out state.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ClientError::RefreshFailed(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else if err.is_builder() {
            ClientError::InvalidRequest(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("stored value is corrupt: {0}")]
    Corrupt(String),
    #[error("cannot resolve storage location: {0}")]
    Location(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Corrupt(err.to_string())
    }
}
