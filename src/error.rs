//! Custom error types for the application.
//!
//! This module defines the primary error type, `ScanError`, for the entire
//! application. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the failure classes of the rig:
//!
//! - **`Config`**: Wraps errors from the `config` crate, typically file
//!   parsing or format issues.
//! - **`Configuration`**: Semantic errors in the configuration — values that
//!   parse fine but are logically invalid (empty pin sets, inverted travel
//!   range). Caught during the validation step.
//! - **`Io`**: Wraps `std::io::Error` for filesystem output.
//! - **`Precondition`**: A job or control action was refused before any
//!   hardware motion (missing alignment, invalid job fields). Never mutates
//!   state.
//! - **`Motion` / `Capture`**: Failures propagated out of the motion layer or
//!   the camera bank when they cannot be recovered locally. Single-device
//!   capture misses are handled inside the bank and never surface here.
//! - **`Cancelled` / `Task`**: A survey was cancelled cooperatively, or its
//!   background task failed to join.
//!
//! By using `#[from]`, `ScanError` can be seamlessly created from underlying
//! error types, simplifying error handling throughout the application with
//! the `?` operator.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, ScanError>;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Precondition violation: {0}")]
    Precondition(String),

    #[error("A survey job is already in progress")]
    JobInProgress,

    #[error("Alignment error: {0}")]
    Alignment(String),

    #[error("Motion error: {0}")]
    Motion(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Survey cancelled")]
    Cancelled,

    #[error("Background task failed: {0}")]
    Task(String),
}

impl ScanError {
    /// Wraps a boundary-layer error as a motion failure.
    pub fn motion(err: impl std::fmt::Display) -> Self {
        ScanError::Motion(err.to_string())
    }

    /// Wraps a boundary-layer error as a capture failure.
    pub fn capture(err: impl std::fmt::Display) -> Self {
        ScanError::Capture(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScanError::Motion("coil write failed".to_string());
        assert_eq!(err.to_string(), "Motion error: coil write failed");
    }

    #[test]
    fn test_precondition_display() {
        let err = ScanError::Precondition("align up before starting".into());
        assert!(err.to_string().contains("Precondition violation"));
    }
}
