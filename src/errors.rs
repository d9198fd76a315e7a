// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::exec::ProcessResult;

#[derive(Error, Debug)]
pub enum BuildtraceError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Faults that end a supervised run early.
///
/// Both variants still carry the canceled [`ProcessResult`] that was recorded
/// for the run, so callers can report elapsed time and pid.
#[derive(Error, Debug)]
pub enum RunError {
    /// The caller's cancellation token fired while waiting for the process.
    #[error("run of {} was cancelled", .0.name)]
    Cancelled(Box<ProcessResult>),

    /// Waiting for the process failed unexpectedly; the process was killed.
    #[error("waiting for {} failed: {source}", .result.name)]
    Wait {
        result: Box<ProcessResult>,
        #[source]
        source: std::io::Error,
    },
}

impl RunError {
    /// The canceled result recorded before the error was raised.
    pub fn result(&self) -> &ProcessResult {
        match self {
            RunError::Cancelled(result) => result,
            RunError::Wait { result, .. } => result,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildtraceError>;
