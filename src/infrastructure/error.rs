//! Infrastructure-level errors (wraps application errors)

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::SieveError;

/// Infrastructure errors wrap application errors and add I/O-level concerns.
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("{0}")]
    Application(#[from] ApplicationError),

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: row {row}, column {column}: invalid count {value:?}")]
    InvalidCell {
        path: PathBuf,
        row: usize,
        column: String,
        value: String,
    },

    #[error("input file not found: {0}")]
    NotFound(PathBuf),
}

impl InfraError {
    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<SieveError> for InfraError {
    fn from(e: SieveError) -> Self {
        Self::Application(ApplicationError::Sieve(e))
    }
}

/// Result type for infrastructure layer operations.
pub type InfraResult<T> = Result<T, InfraError>;
