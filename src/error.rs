//! Error types for the jukebox engine.
//!
//! Library functions return [`Result`], an alias over [`JukeboxError`].
//! The binary wraps these in `anyhow` for context-rich reporting.

use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, JukeboxError>;

/// Errors raised by the jukebox core
#[derive(Error, Debug)]
pub enum JukeboxError {
    /// The analysis handed to the quantum linker failed validation.
    /// `path` names the first offending field, e.g. `beats[3].duration`.
    #[error("Malformed analysis at {path}: {reason}")]
    MalformedAnalysis { path: String, reason: String },

    /// Configuration rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding error for analysis or configuration files
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl JukeboxError {
    pub(crate) fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedAnalysis {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message_names_path() {
        let err = JukeboxError::malformed("beats[3].duration", "must be positive");
        let msg = err.to_string();
        assert!(msg.contains("beats[3].duration"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: JukeboxError = io.into();
        assert!(matches!(err, JukeboxError::Io(_)));
    }
}
