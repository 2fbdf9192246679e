//! Error types shared across the redpipe library.

use anyhow::Error;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RedError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Malformed input row. Recovered locally by the reader that hit it:
    /// the row is skipped, logged and counted, never fatal on its own.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid table definition. Raised before any write happens.
    #[error("Schema error: {0}")]
    Schema(String),

    /// I/O or transaction failure mid-load. Prior committed batches stay valid.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Empty candidate set entering significance scoring.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Statistics backend error: {0}")]
    StatisticsBackend(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

pub type Result<T> = std::result::Result<T, RedError>;

/// Returns `true` if the error originated from a broken pipe.
#[inline]
pub fn is_broken_pipe(err: &Error) -> bool {
    err.root_cause()
        .downcast_ref::<io::Error>()
        .map(|io_err| io_err.kind() == io::ErrorKind::BrokenPipe)
        .unwrap_or(false)
}
