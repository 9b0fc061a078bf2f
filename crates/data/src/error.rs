//! Error types for dataset downloads.

use thiserror::Error;

/// Errors produced while fetching or unpacking datasets
#[derive(Error, Debug)]
pub enum DataError {
    /// Unknown dataset key or HTTP 404
    #[error("not found: {0}")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for DataError {
    fn from(e: reqwest::Error) -> Self {
        DataError::Network(e.to_string())
    }
}

impl From<zip::result::ZipError> for DataError {
    fn from(e: zip::result::ZipError) -> Self {
        DataError::Archive(e.to_string())
    }
}

/// Result alias for data operations.
pub type Result<T> = std::result::Result<T, DataError>;
