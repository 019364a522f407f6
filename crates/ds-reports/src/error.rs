//! Error types for DS Reports
//!
//! Fatal conditions bubble up to `main` as a [`ReportError`] and end the process with a
//! non-zero exit. Per-file problems (signing, upload) are logged where they happen and
//! never become errors.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for report operations
pub type Result<T> = std::result::Result<T, ReportError>;

/// Error type for report operations
#[derive(Error, Debug)]
pub enum ReportError {
    /// Working directory is held by another run
    #[error("{} is locked", .0.display())]
    Locked(PathBuf),

    /// The log store accepted the request but failed to execute the query
    #[error("Log store query failed: {0}")]
    LogStoreQuery(String),

    /// Object store request failed
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// Building or sending an email failed
    #[error("Mail error: {0}")]
    Mail(String),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check the config file and DS_REPORTS_* variables.")]
    Config(String),

    /// Requested send window is not usable
    #[error("Invalid report period: {0}")]
    InvalidPeriod(String),

    /// File system operation failed
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("Network request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// YAML config parsing failed
    #[error("Failed to parse YAML config: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writing failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Zip archive could not be written
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReportError {
    /// Create an object store error
    pub fn object_store(msg: impl Into<String>) -> Self {
        Self::ObjectStore(msg.into())
    }

    /// Create a mail error
    pub fn mail(msg: impl Into<String>) -> Self {
        Self::Mail(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid period error
    pub fn invalid_period(msg: impl Into<String>) -> Self {
        Self::InvalidPeriod(msg.into())
    }

    /// Check if this is a lock contention error
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked(_))
    }
}

impl From<lettre::error::Error> for ReportError {
    fn from(err: lettre::error::Error) -> Self {
        Self::Mail(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for ReportError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Self::Mail(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_message() {
        let err = ReportError::Locked(PathBuf::from("./lock_dir"));
        assert_eq!(err.to_string(), "./lock_dir is locked");
        assert!(err.is_locked());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ReportError = io_err.into();
        assert!(matches!(err, ReportError::Io(_)));
        assert!(!err.is_locked());
    }
}
