//! Unified error type for the pdfshift application.
//!
//! All crates funnel their failures into [`Error`], which carries enough
//! context for API handlers to derive an HTTP status code via
//! [`Error::http_status`]. Synchronous gate rejections (`FileTooLarge`,
//! `PaymentRequired`) and the expiry signal (`Expired`) are first-class
//! variants so handlers never have to pattern-match on message strings.

use std::fmt;

/// Unified error type covering all failure modes in pdfshift.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "task", "order").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The task exists but is past its retention window.
    ///
    /// Deliberately distinct from [`Error::NotFound`] so clients can tell
    /// "never existed" apart from "cleaned up".
    #[error("task expired: {0}")]
    Expired(String),

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The submitted file exceeds the absolute size limit.
    #[error("File too large: {size_mb:.1} MB exceeds the {max_mb} MB limit")]
    FileTooLarge {
        /// Declared size of the submitted file in megabytes.
        size_mb: f64,
        /// Configured maximum in megabytes.
        max_mb: u64,
    },

    /// The file is over the free threshold and no confirmed payment exists.
    #[error("Payment required: {size_mb:.1} MB exceeds the free {free_mb} MB limit")]
    PaymentRequired {
        /// Declared size of the submitted file in megabytes.
        size_mb: f64,
        /// Free-tier threshold in megabytes.
        free_mb: u64,
    },

    /// No conversion command is configured for the task type.
    #[error("Unsupported task type: {0}")]
    UnsupportedTaskType(String),

    /// The converter failed while processing a task.
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// A conversion exceeded the hard time ceiling and was aborted.
    #[error("Conversion timed out after {minutes} minutes")]
    Timeout {
        /// The hard ceiling that was exceeded.
        minutes: u64,
    },

    /// An object-store operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A database operation failed.
    #[error("Database error: {source}")]
    Database {
        /// The underlying database error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Expired(_) => 410,
            Error::Validation(_) => 400,
            Error::FileTooLarge { .. } => 400,
            Error::PaymentRequired { .. } => 402,
            Error::UnsupportedTaskType(_) => 400,
            Error::Conversion(_) => 500,
            Error::Timeout { .. } => 500,
            Error::Storage(_) => 502,
            Error::Database { .. } => 500,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Whether the worker should retry the operation with backoff.
    ///
    /// Only infrastructure faults (storage, database) are transient; domain
    /// failures like a bad conversion are terminal on the first attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Database { .. })
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Database`].
    pub fn database(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Database {
            source: source.into(),
        }
    }

    /// Convenience constructor for [`Error::Storage`].
    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage(message.into())
    }

    /// Convenience constructor for [`Error::Conversion`].
    pub fn conversion(message: impl Into<String>) -> Self {
        Error::Conversion(message.into())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
