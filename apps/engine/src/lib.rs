//! Quiz import and speech engine.
//!
//! Provides:
//! - Importer that turns parsed quiz text into collection notes without duplicates
//! - Import journal with rollback
//! - Text-to-speech orchestration with retry and cancellation
//!
//! The note store, media directory and speech service are reached through
//! the [`Collection`], [`MediaStore`] and [`SpeechProvider`] traits.

pub mod collection;
pub mod config;
pub mod import;
pub mod journal;
pub mod telemetry;
pub mod tts;

pub use collection::{Collection, CollectionError, InMemoryCollection, NewNote, Note, NoteField, NoteId};
pub use config::{Config, ConfigError, ImportConfig, JournalConfig, SecretString, TtsConfig};
pub use import::{import_segments, ImportItem, ImportOutcome, ImportResult, ImportWriteError, SkipReason};
pub use journal::{ImportSession, JournalError, RollbackResult, SessionStore};
pub use tts::{
    HttpSpeechProvider, MediaStore, SpeechProvider, SynthesisReport, Synthesizer, TtsConfigError,
    TtsFailure,
};
