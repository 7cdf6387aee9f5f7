//! Core types for parsed quiz content.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Question kind, decided by the type-marker token that opens a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultiChoice,
    FillBlank,
    FreeResponse,
    Dictation,
}

impl Default for QuestionType {
    fn default() -> Self {
        Self::SingleChoice
    }
}

impl QuestionType {
    /// Get the type name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleChoice => "single_choice",
            Self::MultiChoice => "multi_choice",
            Self::FillBlank => "fill_blank",
            Self::FreeResponse => "free_response",
            Self::Dictation => "dictation",
        }
    }

    /// Resolve a type-marker token such as `Q1`, `multi` or `填空题`.
    ///
    /// ASCII tokens match case-insensitively. Returns `None` for anything
    /// that is not a recognized marker, so ordinary `word:` text is never
    /// mistaken for a new question.
    pub fn from_marker(token: &str) -> Option<Self> {
        let token = token.trim();
        if is_numbered_question(token) {
            return Some(Self::SingleChoice);
        }

        let lowered = token.to_ascii_lowercase();
        match lowered.as_str() {
            "single" | "single-choice" | "sc" | "单选" | "单选题" | "选择题" => {
                Some(Self::SingleChoice)
            }
            "multi" | "multi-choice" | "multiple-choice" | "mc" | "多选" | "多选题" => {
                Some(Self::MultiChoice)
            }
            "fill" | "fill-blank" | "cloze" | "填空" | "填空题" => Some(Self::FillBlank),
            "essay" | "free" | "free-response" | "short-answer" | "问答" | "问答题" => {
                Some(Self::FreeResponse)
            }
            "dictation" | "默写" | "默写题" => Some(Self::Dictation),
            _ => None,
        }
    }
}

/// `Q`, `q`, `Q1`, `Q12` ...
fn is_numbered_question(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some('Q') | Some('q')) && chars.all(|c| c.is_ascii_digit())
}

/// One parsed question unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSegment {
    pub question_type: QuestionType,
    pub stem: String,
    pub options: Vec<String>,
    pub answer: String,
    /// Raw tag strings; each may hold several separator-delimited tags.
    pub tags: BTreeSet<String>,
    /// Deck hierarchy declared by the closest preceding deck line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deck: Option<String>,
    /// 1-based line of the type marker.
    pub line: usize,
}

impl QuestionSegment {
    pub fn new(question_type: QuestionType, stem: impl Into<String>, line: usize) -> Self {
        Self {
            question_type,
            stem: stem.into(),
            options: Vec::new(),
            answer: String::new(),
            tags: BTreeSet::new(),
            deck: None,
            line,
        }
    }
}

/// Parsed questions in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDeck {
    pub segments: Vec<QuestionSegment>,
}

impl ParsedDeck {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QuestionSegment> {
        self.segments.iter()
    }
}

impl From<Vec<QuestionSegment>> for ParsedDeck {
    fn from(segments: Vec<QuestionSegment>) -> Self {
        Self { segments }
    }
}

impl<'a> IntoIterator for &'a ParsedDeck {
    type Item = &'a QuestionSegment;
    type IntoIter = std::slice::Iter<'a, QuestionSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}
