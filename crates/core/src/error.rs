//! Domain error model.

use thiserror::Error;

/// Result type used across the data model.
pub type DomainResult<T> = Result<T, DomainError>;

/// Data-model error.
///
/// Deterministic failures only (validation, malformed identifiers, records that
/// cannot be normalized). Transport and storage failures belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. empty).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A wire record could not be mapped to its canonical shape.
    #[error("cannot normalize {kind}: {reason}")]
    Normalization { kind: &'static str, reason: String },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn normalization(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::Normalization {
            kind,
            reason: reason.into(),
        }
    }
}
