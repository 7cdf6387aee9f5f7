//! Collection capability shared by the importer and the speech engine.
//!
//! The real note store lives outside this crate. Everything the engine
//! needs from it goes through [`Collection`], so the same code runs against
//! a live collection or [`InMemoryCollection`].

pub mod memory;

pub use memory::InMemoryCollection;

use quiz_core::DuplicateKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CollectionError>;

/// Identifier assigned by the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub i64);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteField {
    pub name: String,
    pub value: String,
}

impl NoteField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A stored note as seen through the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub note_type: String,
    pub deck: String,
    pub fields: Vec<NoteField>,
    pub tags: Vec<String>,
}

impl Note {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

/// A note staged by the importer, not yet written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    pub fingerprint: DuplicateKey,
    pub note_type: String,
    pub deck: String,
    pub fields: Vec<NoteField>,
    pub tags: Vec<String>,
}

impl NewNote {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

/// Failures reported by the collection.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollectionError {
    #[error("note not found: {id}")]
    NotFound { id: NoteId },

    #[error("note {id} has no field {field}")]
    UnknownField { id: NoteId, field: String },

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("collection rejected the write: {message}")]
    Rejected { message: String },

    #[error("collection unavailable: {message}")]
    Unavailable { message: String },
}

/// Narrow view of the note store.
///
/// Writes take `&mut self`: the engine is the only writer for the duration
/// of one operation and issues one write at a time.
pub trait Collection {
    /// Whether a note with this fingerprint is already stored.
    fn exists(&self, fingerprint: &DuplicateKey) -> Result<bool>;

    fn create_note(&mut self, note: NewNote) -> Result<NoteId>;

    /// Notes carrying `tag` or one of its `tag::child` descendants. An
    /// empty tag lists every note.
    fn list_notes_by_tag(&self, tag: &str) -> Result<Vec<Note>>;

    fn is_empty(&self) -> Result<bool>;

    fn patch_field(&mut self, id: NoteId, field: &str, value: &str) -> Result<()>;

    fn delete_note(&mut self, id: NoteId) -> Result<()>;
}
