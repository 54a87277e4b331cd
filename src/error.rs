// src/error.rs

//! Crate-wide error type for depot
//!
//! The taxonomy mirrors how errors must be surfaced to HTTP callers:
//! invalid input and wrong file types are caller mistakes (4xx), missing
//! repositories/packages/metadata are not-found (404), and failures of the
//! storage engine or an external metadata generator are upstream failures
//! (5xx). Callers that need to branch should use the predicate helpers
//! rather than matching variants directly.

use crate::name::NameError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed repository name.
    #[error("invalid repository name: {0}")]
    InvalidName(#[from] NameError),

    /// Caller-supplied value that fails validation (bad type string, bad path).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Filename extension does not match the repository type.
    #[error("invalid file type: {0}")]
    InvalidFileType(String),

    /// Repository type string with no registered handler.
    #[error("unsupported repository type: {0}")]
    UnsupportedType(String),

    /// Storage kind or label with no registered constructor.
    #[error("unsupported storage type: {0}")]
    UnsupportedStorage(String),

    /// Operation the repository variant deliberately does not provide.
    #[error("operation not supported: {0}")]
    Unsupported(String),

    /// Repository, package, or metadata artifact absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// I/O failure, wrapped with the operation and path that produced it.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Object-store engine failure.
    #[error("object store error: {0}")]
    ObjectStore(String),

    /// External metadata generator failure, surfaced verbatim.
    #[error("metadata generator failed: {0}")]
    Generator(String),
}

impl Error {
    /// Wrap an I/O error with the operation and path it occurred on.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// True for errors the caller caused (4xx-equivalent).
    pub fn is_invalid(&self) -> bool {
        matches!(
            self,
            Error::InvalidName(_)
                | Error::InvalidInput(_)
                | Error::InvalidFileType(_)
                | Error::UnsupportedType(_)
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::ObjectStore(err.to_string())
    }
}
