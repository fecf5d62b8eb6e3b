//! # Error Types
//!
//! Custom error types for Spor using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Spor
#[derive(Debug, Error)]
pub enum SporError {
    /// `start_recording` called while a session is active
    #[error("Already recording to {}", .0.display())]
    AlreadyRecording(PathBuf),

    /// `record_data_point` or `stop_recording` called while idle
    #[error("Not recording")]
    NotRecording,

    /// Timestamp that cannot be rendered as a UTC date-time
    #[error("Invalid timestamp: {0} ms")]
    InvalidTimestamp(i64),

    /// Malformed position fix from the positioning source
    #[error("Invalid fix: {0}")]
    InvalidFix(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// GPX serialization errors
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SporError {
    /// Whether this error is a caller bug (operation issued in the wrong recorder state)
    pub fn is_usage(&self) -> bool {
        matches!(self, SporError::AlreadyRecording(_) | SporError::NotRecording)
    }
}

/// Result type alias for Spor
pub type Result<T> = std::result::Result<T, SporError>;
