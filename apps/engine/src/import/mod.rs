//! Import of parsed questions into a collection.
//!
//! Each segment is fingerprinted and written at most once: segments whose
//! key already exists in the collection, or was written earlier in the same
//! call, are skipped. Write failures are recorded and the batch continues,
//! so re-running an import over the same text creates nothing new.

pub mod tags;

pub use tags::TagRules;

use crate::collection::{Collection, CollectionError, NewNote, NoteField, NoteId};
use crate::config::ImportConfig;
use quiz_core::{DuplicateKey, ParsedDeck, QuestionSegment};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Why a segment was not written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The collection already holds a note with this fingerprint.
    InCollection,
    /// An earlier segment of the same batch already produced it.
    InBatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ImportOutcome {
    Created { note_id: NoteId },
    Skipped { reason: SkipReason },
    Failed,
}

/// What happened to one segment, in deck order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportItem {
    pub line: usize,
    pub fingerprint: DuplicateKey,
    pub outcome: ImportOutcome,
}

/// A segment the collection would not accept.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("line {line}: {error}")]
pub struct ImportWriteError {
    pub line: usize,
    pub fingerprint: DuplicateKey,
    pub error: CollectionError,
}

/// Outcome of [`import_segments`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub created: usize,
    pub skipped: Vec<DuplicateKey>,
    pub errors: Vec<ImportWriteError>,
    pub items: Vec<ImportItem>,
}

impl ImportResult {
    pub fn created_note_ids(&self) -> Vec<NoteId> {
        self.items
            .iter()
            .filter_map(|item| match item.outcome {
                ImportOutcome::Created { note_id } => Some(note_id),
                _ => None,
            })
            .collect()
    }

    fn record_created(&mut self, line: usize, fingerprint: DuplicateKey, note_id: NoteId) {
        self.created += 1;
        self.items.push(ImportItem {
            line,
            fingerprint,
            outcome: ImportOutcome::Created { note_id },
        });
    }

    fn record_skipped(&mut self, line: usize, fingerprint: DuplicateKey, reason: SkipReason) {
        self.skipped.push(fingerprint.clone());
        self.items.push(ImportItem {
            line,
            fingerprint,
            outcome: ImportOutcome::Skipped { reason },
        });
    }

    fn record_failed(&mut self, line: usize, fingerprint: DuplicateKey, error: CollectionError) {
        tracing::warn!(line, fingerprint = %fingerprint, error = %error, "Note import failed");
        self.errors.push(ImportWriteError {
            line,
            fingerprint: fingerprint.clone(),
            error,
        });
        self.items.push(ImportItem {
            line,
            fingerprint,
            outcome: ImportOutcome::Failed,
        });
    }
}

/// Write every new segment of `deck` to `collection`, in deck order.
pub fn import_segments<C>(deck: &ParsedDeck, collection: &mut C, config: &ImportConfig) -> ImportResult
where
    C: Collection + ?Sized,
{
    let rules = TagRules::new(config);
    let mut result = ImportResult::default();
    let mut written: HashSet<DuplicateKey> = HashSet::new();

    for segment in deck {
        let key = DuplicateKey::of(segment);

        match collection.exists(&key) {
            Ok(true) => {
                let reason = if written.contains(&key) {
                    SkipReason::InBatch
                } else {
                    SkipReason::InCollection
                };
                result.record_skipped(segment.line, key, reason);
                continue;
            }
            Ok(false) => {}
            Err(error) => {
                result.record_failed(segment.line, key, error);
                continue;
            }
        }

        if written.contains(&key) {
            result.record_skipped(segment.line, key, SkipReason::InBatch);
            continue;
        }

        let note = stage_note(segment, key.clone(), &rules, config);
        match collection.create_note(note) {
            Ok(note_id) => {
                tracing::debug!(line = segment.line, note_id = %note_id, "Note created");
                written.insert(key.clone());
                result.record_created(segment.line, key, note_id);
            }
            Err(error) => result.record_failed(segment.line, key, error),
        }
    }

    tracing::info!(
        segments = deck.len(),
        created = result.created,
        skipped = result.skipped.len(),
        errors = result.errors.len(),
        "Import finished"
    );

    result
}

/// Build the note for a segment without writing it.
pub fn stage_note(
    segment: &QuestionSegment,
    fingerprint: DuplicateKey,
    rules: &TagRules<'_>,
    config: &ImportConfig,
) -> NewNote {
    let deck = segment
        .deck
        .clone()
        .unwrap_or_else(|| config.default_deck.clone());
    let tags = rules.tags_for(segment, &deck);

    NewNote {
        fingerprint,
        note_type: config.note_type_for(segment.question_type),
        fields: vec![
            NoteField::new(&config.fields.stem, &segment.stem),
            NoteField::new(
                &config.fields.options,
                render_options(&segment.options, &config.option_joiner),
            ),
            NoteField::new(&config.fields.answer, &segment.answer),
        ],
        deck,
        tags,
    }
}

/// `A. first`, `B. second`, ... joined with `joiner`.
fn render_options(options: &[String], joiner: &str) -> String {
    options
        .iter()
        .enumerate()
        .map(|(idx, text)| match u8::try_from(idx).ok().filter(|i| *i < 26) {
            Some(i) => format!("{}. {}", char::from(b'A' + i), text),
            None => format!("{}. {}", idx + 1, text),
        })
        .collect::<Vec<_>>()
        .join(joiner)
}
