//! Error types for the extract and load engine.
//!
//! Every failure in the core propagates to the caller unmodified. Retrying is the
//! caller's decision; [`EtlError::is_retryable`] tells a task runner which failures
//! are worth another attempt.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EtlError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("Connectivity error: {0}")]
    ConnectivityError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    /// The store rejected the statement for a reason other than schema shape
    /// (constraint violation, unparsable value for a typed column, ...).
    #[error("Database error: {0}")]
    Database(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Transform failed with exit code {exit_code:?}: {stderr}")]
    TransformFailed {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("Timeout error for operation {operation}: {seconds}s elapsed")]
    Timeout { operation: String, seconds: u64 },
    #[error(
        "Pipeline failed: {failed} of {total} partitions did not load ({first_error}); retained artifacts: {failed_artifacts:?}"
    )]
    PipelineFailed {
        failed: usize,
        total: usize,
        first_error: String,
        /// Artifacts left on disk for inspection or replay, in partition order
        failed_artifacts: Vec<PathBuf>,
    },
    /// A spawned task panicked or was cancelled before producing a result
    #[error("Task aborted: {0}")]
    TaskAborted(String),
}

pub type EtlResult<T> = std::result::Result<T, EtlError>;

impl EtlError {
    /// Whether a fresh attempt of the same call could succeed without any change
    /// to its inputs.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EtlError::ConnectivityError(_) | EtlError::StorageError(_) | EtlError::Timeout { .. }
        )
    }

    /// Map an I/O failure on `path`, turning a missing file into `NotFound`.
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => {
                EtlError::NotFound(format!("{}: {error}", path.display()))
            }
            _ => EtlError::StorageError(format!("{}: {error}", path.display())),
        }
    }

    /// Map a CSV failure on `path`. Malformed records are the caller's input problem,
    /// anything underneath them is storage.
    pub fn from_csv(path: &Path, error: csv::Error) -> Self {
        let line = error
            .position()
            .map(|pos| format!(" at line {}", pos.line()))
            .unwrap_or_default();
        match error.kind() {
            csv::ErrorKind::Io(_) => EtlError::StorageError(format!("{}: {error}", path.display())),
            csv::ErrorKind::UnequalLengths { .. } | csv::ErrorKind::Utf8 { .. } => {
                EtlError::InvalidInput(format!("{}{line}: {error}", path.display()))
            }
            _ => EtlError::StorageError(format!("{}{line}: {error}", path.display())),
        }
    }
}

impl From<sqlx::Error> for EtlError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
                classify_sqlstate(&code, db_err.message())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => EtlError::ConnectivityError(err.to_string()),
            sqlx::Error::Configuration(_) => EtlError::Configuration(err.to_string()),
            sqlx::Error::RowNotFound => EtlError::NotFound(err.to_string()),
            _ => EtlError::Database(err.to_string()),
        }
    }
}

/// Classify a PostgreSQL SQLSTATE into the error taxonomy.
pub(crate) fn classify_sqlstate(code: &str, message: &str) -> EtlError {
    let detail = format!("{message} (SQLSTATE {code})");
    match code {
        "42703" | "42804" => EtlError::SchemaMismatch(detail),
        "42P01" | "3F000" => EtlError::NotFound(detail),
        _ if code.starts_with("08") || code.starts_with("57P0") || code == "53300" => {
            EtlError::ConnectivityError(detail)
        }
        _ => EtlError::Database(detail),
    }
}

impl From<tokio::task::JoinError> for EtlError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            EtlError::TaskAborted(format!("task panicked: {err}"))
        } else {
            EtlError::TaskAborted(format!("task cancelled: {err}"))
        }
    }
}

impl From<crate::config::ConfigurationError> for EtlError {
    fn from(error: crate::config::ConfigurationError) -> Self {
        EtlError::Configuration(error.to_string())
    }
}
