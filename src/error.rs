//! Error types and handling infrastructure for boresight.
//!
//! Geometry and input decoding never fail: out-of-range values are clamped. The
//! variants here cover the collaborators around them (persistence, recorder, camera,
//! actuators) and configuration. Callers inside the control loop log these and carry
//! on; only `main` turns them into a process exit.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for boresight operations.
#[derive(Error, Debug)]
pub enum BoresightError {
    /// File system related errors (missing directory, write failure, etc.)
    #[error("File operation failed: {message}")]
    FileError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed or holds an unusable value
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// The persisted aim-point record is missing fields or is not valid JSON
    #[error("Persistence error at {path}: {message}")]
    PersistenceError { path: PathBuf, message: String },

    /// Recorder refused to start or failed while finalizing
    #[error("Recorder error: {message}")]
    RecorderError { message: String },

    /// Camera backend rejected a request (ROI, recording)
    #[error("Camera error: {message}")]
    CameraError { message: String },

    /// Actuator (buzzer, LED) could not be driven
    #[error("Actuator error: {message}")]
    ActuatorError { message: String },

    /// Malformed edge script line or unknown button name
    #[error("Input error: {message}")]
    InputError { message: String },

    /// Encoding failures not tied to a specific collaborator
    #[error("Operation failed: {message}")]
    Other { message: String },
}

/// Standard Result type for boresight operations.
pub type Result<T> = std::result::Result<T, BoresightError>;

impl BoresightError {
    /// Create a FileError from an io::Error with additional context
    pub fn file_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileError {
            message: message.into(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::PersistenceError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn recorder(message: impl Into<String>) -> Self {
        Self::RecorderError {
            message: message.into(),
        }
    }

    pub fn camera(message: impl Into<String>) -> Self {
        Self::CameraError {
            message: message.into(),
        }
    }

    pub fn actuator(message: impl Into<String>) -> Self {
        Self::ActuatorError {
            message: message.into(),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::InputError {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for BoresightError {
    fn from(err: std::io::Error) -> Self {
        let message = match err.kind() {
            std::io::ErrorKind::NotFound => "File not found",
            std::io::ErrorKind::PermissionDenied => "Permission denied",
            _ => "IO operation failed",
        };
        Self::FileError {
            message: message.to_string(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for BoresightError {
    fn from(err: serde_json::Error) -> Self {
        Self::Other {
            message: format!("JSON encoding failed: {}", err),
        }
    }
}
