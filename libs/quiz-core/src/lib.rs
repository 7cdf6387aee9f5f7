//! Core quiz library shared by the import and speech engines.
//!
//! Provides:
//! - Mixed-format quiz text parser with per-line diagnostics
//! - Duplicate keys for question identity
//! - Shared types (QuestionSegment, ParsedDeck, QuestionType)

pub mod error;
pub mod fingerprint;
pub mod parser;
pub mod types;

pub use error::{DiagnosticReason, ParseDiagnostic, ParseError, Result};
pub use fingerprint::{normalize_stem, DuplicateKey};
pub use parser::{parse, parse_file, parse_with, ParseOptions};
pub use types::{ParsedDeck, QuestionSegment, QuestionType};
