//! Store error handling
//!
//! Typed errors for store operations with descriptive messages and,
//! where it helps, recovery suggestions.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Input rejected before anything was written
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Topic id does not exist (only raised where a caller asks for it)
    #[error("Topic not found: #{0}")]
    TopicNotFound(i64),

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Remote fetch or snapshot file failure
    #[error("External I/O failed for '{target}': {details}")]
    ExternalIo { target: String, details: String },

    /// Failed to create data directory
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Atomic write failed
    #[error("Failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// PDF rendering error
    #[error("PDF error: {0}")]
    Pdf(String),

    /// Spreadsheet encoding or decoding error
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Shorthand for a validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation(message.into())
    }

    /// Shorthand for an external I/O failure
    pub fn external(target: impl Into<String>, details: impl std::fmt::Display) -> Self {
        StoreError::ExternalIo {
            target: target.into(),
            details: details.to_string(),
        }
    }

    /// Whether this error was caused by rejected user input
    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Validation(_))
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StoreError::ExternalIo { .. } => {
                Some("Check the archive URL and your network connection, then try again. Local data is unchanged.")
            }
            StoreError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            StoreError::WriteError { .. } => Some("Check free disk space and file permissions."),
            _ => None,
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for StoreError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        StoreError::Spreadsheet(err.to_string())
    }
}

impl From<calamine::XlsxError> for StoreError {
    fn from(err: calamine::XlsxError) -> Self {
        StoreError::Spreadsheet(err.to_string())
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
