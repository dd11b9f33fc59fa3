//! Error types for Ticketry core operations.

use thiserror::Error;

use crate::validation::{ValidationError, ValidationErrors};

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when reading or validating Ticketry records.
#[derive(Error, Debug)]
pub enum Error {
    /// A record failed a single validation check.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A record failed several validation checks.
    #[error(transparent)]
    ValidationSet(#[from] ValidationErrors),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input provided.
    #[error("Invalid input: {reason}")]
    InvalidInput {
        /// Reason the input is invalid.
        reason: String,
    },
}

impl Error {
    /// Returns true if this error came from a validation check.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::ValidationSet(_))
    }
}
