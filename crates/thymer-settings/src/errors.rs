//! Settings error types.

use thiserror::Error;

/// Errors that can occur when loading, parsing, or saving settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to read or write the settings file.
    #[error("settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// The settings file is not valid JSON (or has the wrong shape).
    #[error("failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
