//! Parser for mixed-format quiz text.
//!
//! # Format
//! ```text
//! // Biology::01-Cells
//! Q1: What is 2+2?
//! A. 3
//! B. 4
//! Answer: B
//! Tags: arithmetic easy
//!
//! 填空题：细胞的控制中心是____
//! 答案：细胞核
//! ```
//!
//! A question starts at a type-marker line (`<token>:` with a recognized
//! token). Text after the marker is the first stem line. Option lines
//! (`A.`, `B)`, `(C)`), answer lines and tag lines attach to the open
//! question; any other line continues its stem. Lines starting with the
//! deck prefix set the deck for the questions that follow.
//!
//! Malformed input never aborts the parse. Each problem is reported as a
//! [`ParseDiagnostic`] and every well-formed question is still returned.

use crate::error::{DiagnosticReason, ParseDiagnostic, ParseError, Result};
use crate::types::{ParsedDeck, QuestionSegment, QuestionType};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

const ANSWER_LABELS: &[&str] = &["answer", "ans", "答案", "正确答案"];
const TAG_LABELS: &[&str] = &["tags", "tag", "标签"];

/// Knobs for the line grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Prefix that marks a deck line.
    pub deck_prefix: String,
    /// Accept `:` as a marker delimiter in addition to the full-width `：`.
    pub allow_ascii_colon: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            deck_prefix: "//".to_string(),
            allow_ascii_colon: true,
        }
    }
}

/// Parse quiz text with default options.
pub fn parse(content: &str) -> (ParsedDeck, Vec<ParseDiagnostic>) {
    parse_with(content, &ParseOptions::default())
}

/// Parse quiz text into questions and diagnostics.
pub fn parse_with(content: &str, options: &ParseOptions) -> (ParsedDeck, Vec<ParseDiagnostic>) {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut parser = Parser::new(options);

    for (idx, line) in content.lines().enumerate() {
        parser.process_line(line, idx + 1);
    }

    parser.finish()
}

/// Read a UTF-8 file and parse it.
pub fn parse_file<P: AsRef<Path>>(
    path: P,
    options: &ParseOptions,
) -> Result<(ParsedDeck, Vec<ParseDiagnostic>)> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(ParseError::EmptyPath);
    }

    let content = fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(parse_with(&content, options))
}

struct SegmentBuilder {
    question_type: QuestionType,
    stem_lines: Vec<String>,
    options: Vec<String>,
    answer: Option<String>,
    tags: BTreeSet<String>,
    deck: Option<String>,
    start_line: usize,
}

impl SegmentBuilder {
    fn new(question_type: QuestionType, deck: Option<String>, start_line: usize) -> Self {
        Self {
            question_type,
            stem_lines: Vec::new(),
            options: Vec::new(),
            answer: None,
            tags: BTreeSet::new(),
            deck,
            start_line,
        }
    }

    fn build(self) -> std::result::Result<QuestionSegment, ParseDiagnostic> {
        let stem = self.stem_lines.join("\n").trim().to_string();
        if stem.is_empty() {
            return Err(ParseDiagnostic::new(
                self.start_line,
                DiagnosticReason::EmptyStem,
            ));
        }

        Ok(QuestionSegment {
            question_type: self.question_type,
            stem,
            options: self.options,
            answer: self.answer.unwrap_or_default(),
            tags: self.tags,
            deck: self.deck,
            line: self.start_line,
        })
    }
}

struct Parser<'o> {
    options: &'o ParseOptions,
    deck: Option<String>,
    current: Option<SegmentBuilder>,
    segments: Vec<QuestionSegment>,
    diagnostics: Vec<ParseDiagnostic>,
}

impl<'o> Parser<'o> {
    fn new(options: &'o ParseOptions) -> Self {
        Self {
            options,
            deck: None,
            current: None,
            segments: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn process_line(&mut self, line: &str, line_num: usize) {
        let options = self.options;
        match classify(line, options) {
            LineType::Empty => {}
            LineType::Deck(name) => self.handle_deck(name, line_num),
            LineType::Marker { question_type, rest } => {
                self.finish_segment();
                let mut builder = SegmentBuilder::new(question_type, self.deck.clone(), line_num);
                if !rest.is_empty() {
                    builder.stem_lines.push(rest.to_string());
                }
                self.current = Some(builder);
            }
            LineType::Answer(text) => self.handle_answer(text, line_num),
            LineType::Tags(text) => {
                if let Some(builder) = self.open_segment(line_num) {
                    if !text.is_empty() {
                        builder.tags.insert(text.to_string());
                    }
                }
            }
            LineType::Option(text) => {
                let Some(builder) = self.open_segment(line_num) else {
                    return;
                };
                if text.is_empty() {
                    self.report(line_num, DiagnosticReason::EmptyOption);
                } else {
                    builder.options.push(text.to_string());
                }
            }
            LineType::Text(text) => {
                if let Some(builder) = self.open_segment(line_num) {
                    builder.stem_lines.push(text.to_string());
                }
            }
        }
    }

    /// The segment a body line belongs to; reports an orphan when there is none.
    fn open_segment(&mut self, line_num: usize) -> Option<&mut SegmentBuilder> {
        if self.current.is_none() {
            self.report(line_num, DiagnosticReason::OrphanLine);
        }
        self.current.as_mut()
    }

    fn handle_deck(&mut self, name: &str, line_num: usize) {
        self.finish_segment();
        if name.is_empty() {
            self.report(line_num, DiagnosticReason::MissingDeckName);
            self.deck = None;
        } else {
            self.deck = Some(name.to_string());
        }
    }

    fn handle_answer(&mut self, text: &str, line_num: usize) {
        let Some(builder) = self.open_segment(line_num) else {
            return;
        };

        if text.is_empty() {
            return;
        }
        if builder.answer.is_some() {
            self.report(line_num, DiagnosticReason::DuplicateAnswer);
        } else {
            builder.answer = Some(text.to_string());
        }
    }

    fn report(&mut self, line: usize, reason: DiagnosticReason) {
        self.diagnostics.push(ParseDiagnostic::new(line, reason));
    }

    fn finish_segment(&mut self) {
        if let Some(builder) = self.current.take() {
            match builder.build() {
                Ok(segment) => self.segments.push(segment),
                Err(diagnostic) => self.diagnostics.push(diagnostic),
            }
        }
    }

    fn finish(mut self) -> (ParsedDeck, Vec<ParseDiagnostic>) {
        self.finish_segment();
        // Empty-stem diagnostics surface when the segment closes; keep the list in source order.
        self.diagnostics.sort_by_key(|d| d.line);
        (ParsedDeck::from(self.segments), self.diagnostics)
    }
}

#[derive(Debug, PartialEq)]
enum LineType<'a> {
    Empty,
    Deck(&'a str),
    Marker {
        question_type: QuestionType,
        rest: &'a str,
    },
    Answer(&'a str),
    Tags(&'a str),
    Option(&'a str),
    Text(&'a str),
}

fn classify<'a>(line: &'a str, options: &ParseOptions) -> LineType<'a> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineType::Empty;
    }

    if !options.deck_prefix.is_empty() {
        if let Some(rest) = trimmed.strip_prefix(options.deck_prefix.as_str()) {
            return LineType::Deck(rest.trim());
        }
    }

    if let Some((head, rest)) = split_unquoted(trimmed, options.allow_ascii_colon) {
        let head = head.trim();
        let rest = rest.trim();
        if let Some(question_type) = QuestionType::from_marker(head) {
            return LineType::Marker {
                question_type,
                rest,
            };
        }
        if matches_label(head, ANSWER_LABELS) {
            return LineType::Answer(rest);
        }
        if matches_label(head, TAG_LABELS) {
            return LineType::Tags(rest);
        }
    }

    if let Some(text) = split_option(trimmed) {
        return LineType::Option(text);
    }

    LineType::Text(trimmed)
}

fn matches_label(head: &str, labels: &[&str]) -> bool {
    let lowered = head.to_ascii_lowercase();
    labels.iter().any(|label| *label == lowered)
}

/// Split at the first delimiter that is not inside a double-quoted run.
///
/// `\"` escapes a quote anywhere; `""` inside quotes is a literal quote.
fn split_unquoted(line: &str, allow_ascii_colon: bool) -> Option<(&str, &str)> {
    let mut in_quotes = false;
    let mut chars = line.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        match ch {
            '\\' => {
                chars.next();
            }
            '"' => {
                if in_quotes && matches!(chars.peek(), Some((_, '"'))) {
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            '：' if !in_quotes => {
                return Some((&line[..idx], &line[idx + ch.len_utf8()..]));
            }
            ':' if !in_quotes && allow_ascii_colon => {
                return Some((&line[..idx], &line[idx + 1..]));
            }
            _ => {}
        }
    }

    None
}

/// Recognize `A.`, `A)`, `A、`, `A．`, `A）` and `(A)` option prefixes.
fn split_option(line: &str) -> Option<&str> {
    if let Some(inner) = line.strip_prefix('(').or_else(|| line.strip_prefix('（')) {
        let letter = inner.chars().next()?;
        if !letter.is_ascii_uppercase() {
            return None;
        }
        let after = &inner[1..];
        let text = after
            .strip_prefix(')')
            .or_else(|| after.strip_prefix('）'))?;
        return Some(text.trim());
    }

    let letter = line.chars().next()?;
    if !letter.is_ascii_uppercase() {
        return None;
    }
    let after = &line[1..];
    let delim = after.chars().next()?;
    if !matches!(delim, '.' | ')' | '、' | '．' | '）') {
        return None;
    }

    let text = &after[delim.len_utf8()..];
    // "U.S. policy" is prose, not option U.
    if delim == '.' && looks_like_abbreviation(text) {
        return None;
    }
    Some(text.trim())
}

fn looks_like_abbreviation(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(letter), Some('.')) if letter.is_ascii_uppercase()
    )
}
