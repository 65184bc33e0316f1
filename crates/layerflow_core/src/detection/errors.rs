//! Error types for layer detection.

use std::io;

use thiserror::Error;

/// Errors produced while detecting or storing layers.
#[derive(Error, Debug)]
pub enum DetectionError {
    /// The request itself is malformed (bad id, undecodable screenshot, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The element-query capability could not produce a tree.
    #[error("Detection unavailable: {0}")]
    Unavailable(String),

    /// A stored detection was requested that does not exist.
    #[error("Detection not found: {0}")]
    NotFound(String),

    /// A structural query uses syntax the matcher does not understand.
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// JSON (de)serialization error.
    #[error("Failed to process {what} JSON: {source}")]
    Json {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

impl DetectionError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Create a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a JSON error with context.
    pub fn json(what: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            what: what.into(),
            source,
        }
    }
}

/// Result type for detection operations.
pub type DetectResult<T> = Result<T, DetectionError>;
