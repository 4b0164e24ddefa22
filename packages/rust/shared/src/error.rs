//! Error types for modulsync.
//!
//! Library crates use [`ModulsyncError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Failures of single items (one page that would not download, one document
//! that would not parse) are not errors at this level: the phases record them
//! as data in their summaries and keep going.

use std::path::PathBuf;

/// Top-level error type for all modulsync operations.
#[derive(Debug, thiserror::Error)]
pub enum ModulsyncError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to the catalog site.
    #[error("network error: {0}")]
    Network(String),

    /// HTML parsing or content extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A dataset on disk is malformed (missing meta keys, broken versions).
    #[error("dataset integrity error in {path:?}: {message}")]
    Integrity { path: PathBuf, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ModulsyncError>;

impl ModulsyncError {
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

    /// Create an integrity error for the dataset at `path`.
    pub fn integrity(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Integrity {
            path: path.into(),
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
}
