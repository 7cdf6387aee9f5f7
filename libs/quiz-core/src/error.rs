//! Error and diagnostic types for quiz-core.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using ParseError.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Errors that stop a parse before any line is read.
///
/// Malformed segments never produce one of these; they become
/// [`ParseDiagnostic`]s instead.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("file path is empty")]
    EmptyPath,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a line or segment was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticReason {
    #[error("question has an empty stem")]
    EmptyStem,

    #[error("line is outside any question")]
    OrphanLine,

    #[error("deck line is missing a name")]
    MissingDeckName,

    #[error("question already has an answer")]
    DuplicateAnswer,

    #[error("option has no text")]
    EmptyOption,
}

/// A recoverable problem found while parsing, tied to a 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("line {line}: {reason}")]
pub struct ParseDiagnostic {
    pub line: usize,
    pub reason: DiagnosticReason,
}

impl ParseDiagnostic {
    pub fn new(line: usize, reason: DiagnosticReason) -> Self {
        Self { line, reason }
    }
}
