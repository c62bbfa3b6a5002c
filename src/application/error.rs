//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::SieveError;

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Sieve(#[from] SieveError),

    #[error("config error: {message}")]
    Config { message: String },

    #[error("no {0} background configured")]
    MissingBackground(String),
}

impl ApplicationError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
