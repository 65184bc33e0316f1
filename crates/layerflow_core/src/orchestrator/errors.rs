//! Error types for render submission and execution.
//!
//! Submission errors (`InvalidInput`, `NotFound`, `Stopped`) reach the
//! caller synchronously. Execution errors end up as a failed job's detail.
//! Cleanup failures are only ever logged.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::detection::DetectionError;

/// Errors from the render service and its worker.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Malformed submission; no job was created.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown job or detection.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The renderer failed or produced no output.
    #[error("{0}")]
    RenderFailure(String),

    /// The renderer exceeded its wall-clock limit and was killed.
    #[error("Renderer timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Input files could not be staged for the renderer.
    #[error("Staging failed while {operation}: {source}")]
    Staging {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// The service no longer accepts work.
    #[error("Render service is stopped")]
    Stopped,
}

impl RenderError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a render failure.
    pub fn render_failure(message: impl Into<String>) -> Self {
        Self::RenderFailure(message.into())
    }

    /// Create a render failure for a non-zero exit.
    pub fn exit_code(code: Option<i32>) -> Self {
        match code {
            Some(code) => Self::RenderFailure(format!("Process exited with code {}", code)),
            None => Self::RenderFailure("Process terminated by signal".to_string()),
        }
    }

    /// Create a staging error with context.
    pub fn staging(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Staging {
            operation: operation.into(),
            source,
        }
    }

    /// Whether the error was raised synchronously at submission.
    pub fn is_submission_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::NotFound(_) | Self::Stopped
        )
    }
}

impl From<DetectionError> for RenderError {
    fn from(err: DetectionError) -> Self {
        match err {
            DetectionError::NotFound(id) => Self::NotFound(format!("detection '{}'", id)),
            DetectionError::InvalidInput(message) => Self::InvalidInput(message),
            other => Self::InvalidInput(format!("detection is unreadable: {}", other)),
        }
    }
}

/// A staged file that could not be removed after a render.
#[derive(Error, Debug)]
#[error("Failed to remove staged file {}: {source}", .path.display())]
pub struct CleanupFailure {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_detail() {
        assert_eq!(
            RenderError::exit_code(Some(1)).to_string(),
            "Process exited with code 1"
        );
        assert!(RenderError::exit_code(None).to_string().contains("signal"));
        assert_eq!(
            RenderError::Timeout { seconds: 120 }.to_string(),
            "Renderer timed out after 120s"
        );
    }

    #[test]
    fn detection_errors_map_to_submission_errors() {
        let err: RenderError = DetectionError::not_found("abc").into();
        assert!(matches!(err, RenderError::NotFound(ref m) if m.contains("abc")));
        assert!(err.is_submission_error());

        let err: RenderError = DetectionError::invalid_input("empty id").into();
        assert!(matches!(err, RenderError::InvalidInput(_)));
        assert!(!RenderError::Timeout { seconds: 1 }.is_submission_error());
    }

    #[test]
    fn cleanup_failure_names_path() {
        let failure = CleanupFailure {
            path: PathBuf::from("/tmp/job-config.json"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = failure.to_string();
        assert!(msg.contains("job-config.json"));
        assert!(msg.contains("denied"));
    }
}
