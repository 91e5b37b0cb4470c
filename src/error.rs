// src/error.rs

//! Error types shared by every stage of the ingestion pipeline

use crate::compression::CompressionError;
use crate::publish::ServiceError;
use crate::validate::ValidationError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad invocation: missing arguments, missing archive file, ...
    #[error("{0}")]
    Usage(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read tarball {path}: {message}")]
    Archive { path: PathBuf, message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Compression(#[from] CompressionError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("{0}")]
    CacheHelper(String),

    #[error("checksum of {path} is {actual}, expected {expected}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// A compat layer update failed after its transaction was opened; the
    /// transaction has been aborted.
    #[error("error while updating the compatibility layer, transaction aborted: {0}")]
    CompatUpdateAborted(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn archive(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Archive {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
