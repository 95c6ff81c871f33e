//! Error types for waiver application.

use std::path::Path;

use thiserror::Error;

/// Result type alias using our error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the waiver engine and its file plumbing.
#[derive(Error, Debug)]
pub enum Error {
    /// Waiver policy or test-category problems
    #[error("Configuration error: {0}")]
    Config(String),

    /// Result document is unreadable or structurally unusable
    #[error("Input error: {0}")]
    Input(String),

    /// Result file extension is neither `.json` nor `.xml`
    #[error("Unsupported result file (expected .json or .xml): {path}")]
    UnsupportedFormat { path: String },

    /// Output could not be persisted
    #[error("Write error: {path}: {message}")]
    Write { path: String, message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] Box<std::io::Error>),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] Box<serde_json::Error>),

    /// XML parse errors
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// XML serialization errors
    #[error("XML write error: {0}")]
    XmlWrite(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an input error.
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    /// Create an unsupported-format error for `path`.
    pub fn unsupported_format(path: &Path) -> Self {
        Self::UnsupportedFormat {
            path: path.display().to_string(),
        }
    }

    /// Create a write error for `path`.
    pub fn write(path: &Path, message: impl Into<String>) -> Self {
        Self::Write {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    /// True for errors that must abort processing of a result document.
    #[must_use]
    pub const fn is_fatal_input(&self) -> bool {
        matches!(
            self,
            Self::Input(_)
                | Self::UnsupportedFormat { .. }
                | Self::Io(_)
                | Self::Json(_)
                | Self::XmlParse(_)
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Box::new(value))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(Box::new(value))
    }
}

impl From<xmltree::ParseError> for Error {
    fn from(value: xmltree::ParseError) -> Self {
        Self::XmlParse(value.to_string())
    }
}
