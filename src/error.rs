//! Centralized error handling for tabula.
//!
//! Every fallible public operation returns [`Result<T>`], an alias over
//! [`TabulaError`]. The variants mirror the conditions a dashboard can
//! react to:
//!
//! - [`TabulaError::MissingConfiguration`]: no dataset path is configured and
//!   no upload override is active.
//! - [`TabulaError::UnsupportedFormat`]: the file extension is not one tabula
//!   can read.
//! - [`TabulaError::UnreadableSource`]: the file could not be stat'ed, or every
//!   parse strategy failed.
//! - [`TabulaError::ColumnNotFound`] / [`TabulaError::NonNumericColumn`]: the
//!   request named a column that is absent or cannot be used numerically.
//!
//! Parse strategies inside the loader use `anyhow` internally; only the
//! exhaustion of the whole chain surfaces as `UnreadableSource`.
//!
//! ```
//! use tabula::error::{Result, ResultExt as _};
//!
//! fn read_source(path: &str) -> Result<Vec<u8>> {
//!     std::fs::read(path).with_context(|| format!("Failed to read {path}"))
//! }
//! ```

use std::fmt;

/// Main error type for tabula operations.
#[derive(Debug)]
pub enum TabulaError {
    /// No dataset path configured and no upload override present
    MissingConfiguration,

    /// File extension not in the recognized set
    UnsupportedFormat(String),

    /// Source could not be stat'ed or parsed by any strategy
    UnreadableSource(String),

    /// Requested column is absent from the current table
    ColumnNotFound(String),

    /// Numeric-only operation on a non-numeric or fully-null column
    NonNumericColumn(String),

    /// Upload exceeded the configured size limit (bytes)
    PayloadTooLarge(usize),

    /// Malformed request parameters
    BadRequest(String),

    /// Configuration errors
    Config(String),

    /// I/O errors
    Io(std::io::Error),

    /// Polars / frame construction errors
    DataProcessing(String),

    /// Generic error with context
    Other(String),
}

impl fmt::Display for TabulaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingConfiguration => {
                write!(f, "No dataset configured: set DATASET_PATH or upload a file")
            }
            Self::UnsupportedFormat(ext) => write!(f, "Unsupported file format: {ext}"),
            Self::UnreadableSource(msg) => write!(f, "Unreadable source: {msg}"),
            Self::ColumnNotFound(name) => write!(f, "column not found: {name}"),
            Self::NonNumericColumn(name) => {
                write!(f, "column is not numeric or has no values: {name}")
            }
            Self::PayloadTooLarge(limit) => {
                write!(f, "Upload exceeds the {limit} byte limit")
            }
            Self::BadRequest(msg) => write!(f, "Bad request: {msg}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::DataProcessing(msg) => write!(f, "Data processing error: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for TabulaError {}

impl From<std::io::Error> for TabulaError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<anyhow::Error> for TabulaError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for TabulaError {
    fn from(err: serde_json::Error) -> Self {
        Self::DataProcessing(format!("JSON error: {err}"))
    }
}

impl From<polars::error::PolarsError> for TabulaError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::DataProcessing(err.to_string())
    }
}

impl From<figment::Error> for TabulaError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for tabula operations.
pub type Result<T> = std::result::Result<T, TabulaError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<TabulaError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: TabulaError = e.into();
            TabulaError::Other(format!("{}: {err}", msg.into()))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: TabulaError = e.into();
            TabulaError::Other(format!("{}: {err}", f()))
        })
    }
}
