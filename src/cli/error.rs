//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::exitcode;
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Usage(String),
}

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        Self::Infra(InfraError::Application(e))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) | CliError::Usage(_) => exitcode::USAGE,
            CliError::Infra(e) => match e {
                InfraError::Io { .. } => exitcode::IOERR,
                InfraError::NotFound(_) => exitcode::NOINPUT,
                InfraError::Csv { .. } | InfraError::InvalidCell { .. } => exitcode::DATAERR,
                InfraError::Application(app) => match app {
                    ApplicationError::Sieve(_) => exitcode::DATAERR,
                    ApplicationError::Config { .. } | ApplicationError::MissingBackground(_) => {
                        exitcode::CONFIG
                    }
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SchemaError, SieveError};
    use std::path::PathBuf;

    #[test]
    fn test_exit_codes_follow_error_layer() {
        let schema: CliError = ApplicationError::Sieve(SieveError::Schema(SchemaError::MissingCount(
            "C>A".into(),
        )))
        .into();
        assert_eq!(schema.exit_code(), exitcode::DATAERR);
        assert!(schema.to_string().contains("C>A"));

        let missing: CliError = ApplicationError::MissingBackground("genome".into()).into();
        assert_eq!(missing.exit_code(), exitcode::CONFIG);

        let not_found = CliError::Infra(InfraError::NotFound(PathBuf::from("counts.csv")));
        assert_eq!(not_found.exit_code(), exitcode::NOINPUT);

        assert_eq!(CliError::Usage("x".into()).exit_code(), exitcode::USAGE);
    }
}
