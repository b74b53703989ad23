//! Error types for passblur.
//!
//! This module defines the crate-level error type. Public control operations
//! on the engine never fail; these errors surface from configuration loading,
//! settings parsing and the internal helpers whose failures the engine logs
//! and skips.

use thiserror::Error;

use crate::dom::DomError;
use crate::engine::ClipboardError;

/// The main error type for passblur operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Document Errors ===
    /// A document operation failed.
    #[error("document error: {0}")]
    Dom(#[from] DomError),

    /// An element could not be classified because its state is unusable.
    #[error("cannot classify element: {reason}")]
    Unclassifiable {
        /// Why the element was skipped.
        reason: String,
    },

    // === Clipboard Errors ===
    /// Copying a value to the clipboard failed on every path.
    #[error("clipboard error: {0}")]
    Clipboard(#[from] ClipboardError),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for passblur operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create an error for an element that cannot be classified.
    #[must_use]
    pub fn unclassifiable(reason: impl Into<String>) -> Self {
        Self::Unclassifiable {
            reason: reason.into(),
        }
    }

    /// Check if this error only means the element should be skipped.
    #[must_use]
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::Unclassifiable { .. } | Self::Dom(_))
    }
}
