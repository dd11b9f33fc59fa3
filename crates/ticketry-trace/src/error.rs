//! Error types for trace context operations.

use ticketry_core::ValidationErrors;

/// Result type alias using [`TraceError`].
pub type Result<T> = std::result::Result<T, TraceError>;

/// Errors that can occur while parsing identifiers or loading trace configuration.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// An identifier string was not valid hex of the expected width.
    #[error("Invalid {kind} ID '{value}': {reason}")]
    InvalidId {
        /// Which identifier was being parsed (`trace` or `span`).
        kind: &'static str,
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Sampling configuration failed validation.
    #[error("Invalid sampling configuration: {0}")]
    InvalidConfig(#[from] ValidationErrors),

    /// Sampling configuration file could not be read.
    #[error("Failed to read sampling configuration from {path}: {source}")]
    ConfigRead {
        /// Path to the configuration file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Sampling configuration could not be parsed.
    #[error("Failed to parse sampling configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
}
