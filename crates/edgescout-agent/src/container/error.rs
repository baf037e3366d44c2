use std::time::Duration;
use thiserror::Error;

/// How a container runtime failure should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth one more attempt after cleanup
    Retryable,
    /// Expected operational failure; log a warning and carry on without the result
    Degrade,
    /// Points at a broken environment or a defect; log as an error
    Unexpected,
}

/// Error type for container runtime operations
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A container with this name already exists
    #[error("container name '{0}' is already in use")]
    NameConflict(String),

    /// The runtime ran the operation and reported failure
    #[error("{operation} failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        operation: &'static str,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// The runtime client could not be started at all
    #[error("failed to execute {operation}: {source}")]
    Spawn {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected output from {operation}: {detail}")]
    UnexpectedOutput {
        operation: &'static str,
        detail: String,
    },
}

impl RuntimeError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RuntimeError::NameConflict(_) => ErrorClass::Retryable,
            RuntimeError::CommandFailed { .. } | RuntimeError::Timeout { .. } => ErrorClass::Degrade,
            RuntimeError::Spawn { .. } | RuntimeError::UnexpectedOutput { .. } => {
                ErrorClass::Unexpected
            }
        }
    }
}
