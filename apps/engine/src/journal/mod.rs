//! Import journal.
//!
//! Every import can be recorded as a session listing what happened to each
//! segment. A session's created notes can later be rolled back.

pub mod error;
pub mod schema;
pub mod store;

pub use error::JournalError;
pub use store::SessionStore;

use crate::collection::{CollectionError, NoteId};
use chrono::{DateTime, Utc};
use quiz_core::DuplicateKey;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAction {
    Created,
    Skipped,
    Failed,
}

impl SessionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "created" => Some(Self::Created),
            "skipped" => Some(Self::Skipped),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One segment of a recorded import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionItem {
    pub line: usize,
    pub fingerprint: DuplicateKey,
    pub action: SessionAction,
    pub note_id: Option<NoteId>,
    pub error: Option<String>,
}

/// A recorded import call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSession {
    pub id: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
    pub rolled_back_at: Option<DateTime<Utc>>,
    pub items: Vec<SessionItem>,
}

impl ImportSession {
    pub fn created_note_ids(&self) -> Vec<NoteId> {
        self.items
            .iter()
            .filter(|item| item.action == SessionAction::Created)
            .filter_map(|item| item.note_id)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackFailure {
    pub note_id: NoteId,
    pub error: CollectionError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackResult {
    pub deleted: Vec<NoteId>,
    pub missing: Vec<NoteId>,
    pub errors: Vec<RollbackFailure>,
    pub already_rolled_back: bool,
}
