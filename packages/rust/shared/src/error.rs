//! Error types for illustra.
//!
//! Library crates use [`IllustraError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all illustra operations.
#[derive(Debug, thiserror::Error)]
pub enum IllustraError {
    /// The article content file is missing or unreadable.
    #[error("content not found at {path:?}: {reason}")]
    ContentNotFound { path: PathBuf, reason: String },

    /// The material directory does not exist or cannot be listed.
    #[error("material directory {path:?} is invalid: {reason}")]
    MaterialDirectoryInvalid { path: PathBuf, reason: String },

    /// Every configured image provider was tried and none produced an image.
    #[error("no image available for {request} (tried: {})", tried.join(", "))]
    NoImageAvailable { request: String, tried: Vec<String> },

    /// The upload service answered with an error status or without the expected field.
    #[error("upload rejected: {message}")]
    UploadRejected { message: String },

    /// Network/HTTP error talking to a provider or the upload service.
    #[error("network error: {0}")]
    Network(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad response shape, invalid input, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Markup or data parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, IllustraError>;

impl IllustraError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an upload rejection from any displayable message.
    pub fn upload_rejected(msg: impl Into<String>) -> Self {
        Self::UploadRejected {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a `ContentNotFound` error for `path`.
    pub fn content_not_found(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ContentNotFound {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build a `MaterialDirectoryInvalid` error for `path`.
    pub fn material_dir_invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MaterialDirectoryInvalid {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Errors that should abort a publish when raised for a mandatory requirement.
    ///
    /// Everything else is recoverable at the provider or slot level.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ContentNotFound { .. }
                | Self::MaterialDirectoryInvalid { .. }
                | Self::NoImageAvailable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = IllustraError::config("missing access token");
        assert_eq!(err.to_string(), "config error: missing access token");

        let err = IllustraError::NoImageAvailable {
            request: "\"city skyline\"".into(),
            tried: vec!["pexels".into(), "picsum".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("city skyline"));
        assert!(msg.contains("pexels, picsum"));
    }

    #[test]
    fn fatal_classification() {
        assert!(IllustraError::content_not_found("/tmp/a.md", "missing").is_fatal());
        assert!(IllustraError::material_dir_invalid("/tmp/x", "not a directory").is_fatal());
        assert!(!IllustraError::Network("timeout".into()).is_fatal());
        assert!(!IllustraError::upload_rejected("errcode 40001").is_fatal());
    }
}
