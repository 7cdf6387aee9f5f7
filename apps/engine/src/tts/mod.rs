//! Text-to-speech for collection fields.
//!
//! [`Synthesizer`] scans notes under a tag, requests audio for target
//! fields that have none, stores it in a [`MediaStore`] under a name derived
//! from the text and voice, and appends a sound marker to the field. Media
//! that already exists is reused, so repeated runs over unchanged notes make
//! no provider calls.

pub mod error;
pub mod http;
pub mod markup;
pub mod media;
pub mod orchestrator;
pub mod provider;

pub use error::{MediaError, ProviderError, TtsConfigError, TtsFailure};
pub use http::HttpSpeechProvider;
pub use media::{FsMediaStore, InMemoryMediaStore, MediaStore};
pub use orchestrator::{
    AudioTask, RetryPolicy, ScanOutcome, SynthesisReport, SynthesisResult, Synthesizer, TaskFailure,
};
pub use provider::{SpeechProvider, SpeechRequest, VoiceFilter, VoiceInfo};
