//! Errors surfaced by the `droplimiter` binary.

use droplimiter_core::LimiterError;
use thiserror::Error;

/// Everything that can stop a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// The configuration file is missing, unreadable or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The drop table, ledger, store or report failed.
    #[error(transparent)]
    Limiter(#[from] LimiterError),

    /// The log sinks could not be installed.
    #[error("logging error: {0}")]
    Logging(String),
}

/// Result type for the operator crate.
pub type AppResult<T> = Result<T, AppError>;
