//! Journal error types.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("cannot prepare journal directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no platform data directory for the journal")]
    NoDataDir,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
