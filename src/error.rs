//! Error types for SapTuner
//!
//! This module defines all error types used throughout the application,
//! providing detailed error information for debugging and user feedback.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for SapTuner operations
#[derive(Error, Debug)]
pub enum TuneError {
    /// Unknown note or solution identifier
    #[error("No such note or solution: {0}")]
    NotFound(String),

    /// Solution exists but has no definition for the current platform key
    #[error("Solution '{name}' is not defined for platform '{platform}'")]
    UnsupportedPlatform {
        /// Solution name as requested
        name: String,
        /// Platform key the catalog was resolved for
        platform: String,
    },

    /// Revert requested on a note or solution that is not currently active
    #[error("'{0}' has not been applied, nothing to revert")]
    NotActive(String),

    /// A live parameter value could not be read
    #[error("Failed to read parameter '{key}': {message}")]
    Read {
        /// Parameter key
        key: String,
        /// Underlying failure
        message: String,
    },

    /// A parameter value could not be written
    #[error("Failed to write parameter '{key}': {message}")]
    Write {
        /// Parameter key
        key: String,
        /// Underlying failure
        message: String,
    },

    /// The persisted tuning state file is unreadable or invalid
    #[error("Tuning state file '{path}' is corrupt: {message}")]
    StateCorrupt {
        /// State file location
        path: PathBuf,
        /// Parse failure detail
        message: String,
    },

    /// The exclusive state lock could not be acquired in time
    #[error("Could not lock tuning state within {0:?}; another saptuner invocation may be running")]
    LockTimeout(Duration),

    /// A tuning sheet could not be parsed
    #[error("Invalid tuning sheet '{path}': {message}")]
    InvalidSheet {
        /// Sheet file location
        path: PathBuf,
        /// Parse failure detail
        message: String,
    },

    /// Service control (systemctl/tuned) failure
    #[error("Service control failed for '{unit}': {message}")]
    Service {
        /// Unit or profile name
        unit: String,
        /// Failure detail
        message: String,
    },

    /// I/O error with path context
    #[error("I/O error at '{path}': {source}")]
    Io {
        /// Affected path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Multiple errors occurred during a bulk operation
    #[error("{count} operations failed: {}", summarize(.errors))]
    Aggregate {
        /// Number of collected failures
        count: usize,
        /// Every failure, in the order it occurred
        errors: Vec<TuneError>,
    },
}

fn summarize(errors: &[TuneError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl TuneError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a parameter read error
    pub fn read(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Read {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a parameter write error
    pub fn write(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Check if this error is retryable by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout(_))
    }

    /// Check if this error must stop any further state mutation
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StateCorrupt { .. })
    }
}

/// Result type alias for SapTuner operations
pub type Result<T> = std::result::Result<T, TuneError>;

/// Folds the failures collected by a bulk operation into a single result.
///
/// An empty list is success, a single failure is returned as-is, and
/// anything more becomes [`TuneError::Aggregate`].
pub fn aggregate(mut errors: Vec<TuneError>) -> Result<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.swap_remove(0)),
        n => Err(TuneError::Aggregate { count: n, errors }),
    }
}
