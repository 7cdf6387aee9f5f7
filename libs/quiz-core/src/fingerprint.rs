//! Duplicate detection keys.

use crate::types::{QuestionSegment, QuestionType};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Deterministic identity of a question: SHA-256 over the question type and
/// the normalized stem.
///
/// Two segments that differ only in whitespace or letter case share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DuplicateKey(String);

impl DuplicateKey {
    /// Compute the key for a stem of the given type.
    pub fn compute(stem: &str, question_type: QuestionType) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(question_type.as_str().as_bytes());
        hasher.update([0x1f]);
        hasher.update(normalize_stem(stem).as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Compute the key for a parsed segment.
    pub fn of(segment: &QuestionSegment) -> Self {
        Self::compute(&segment.stem, segment.question_type)
    }

    /// Wrap a key previously produced by [`DuplicateKey::compute`].
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DuplicateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Drop all whitespace and lowercase the rest.
pub fn normalize_stem(stem: &str) -> String {
    stem.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_removes_whitespace_and_case() {
        assert_eq!(normalize_stem("  What IS\t2 + 2?\n"), "whatis2+2?");
        // Ideographic space is whitespace too.
        assert_eq!(normalize_stem("细胞\u{3000}膜"), "细胞膜");
    }

    #[test]
    fn formatting_noise_yields_same_key() {
        let a = DuplicateKey::compute("What is Rust?", QuestionType::FreeResponse);
        let b = DuplicateKey::compute("  what   is\nRUST? ", QuestionType::FreeResponse);
        assert_eq!(a, b);
    }

    #[test]
    fn type_is_part_of_identity() {
        let a = DuplicateKey::compute("Pick one", QuestionType::SingleChoice);
        let b = DuplicateKey::compute("Pick one", QuestionType::MultiChoice);
        assert_ne!(a, b);
    }

    #[test]
    fn key_is_lowercase_hex() {
        let key = DuplicateKey::compute("x", QuestionType::FillBlank);
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
