//! Common test utilities for engine integration tests.
//!
//! Provides a scripted speech provider, a media store that refuses writes,
//! and configuration tuned for fast retries.

pub mod fixtures;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use quizdeck_engine::tts::{
    MediaError, MediaStore, ProviderError, SpeechProvider, SpeechRequest, VoiceFilter, VoiceInfo,
};
use quizdeck_engine::{SecretString, TtsConfig};

pub const AUDIO: &[u8] = b"ID3-fake-audio";

/// Install the tracing subscriber once; later calls are no-ops.
pub fn init() {
    let _ = quizdeck_engine::telemetry::init_tracing();
}

/// TTS settings pointing at a fake endpoint with millisecond backoff.
pub fn tts_config() -> TtsConfig {
    TtsConfig {
        base_url: "https://tts.example.com".to_string(),
        key: SecretString::new("test-key"),
        retry_backoff_ms: 1,
        max_backoff_ms: 4,
        ..TtsConfig::default()
    }
}

/// Speech provider that replays scripted responses, then succeeds.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<Vec<u8>, ProviderError>>>,
    requests: Mutex<Vec<SpeechRequest>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(responses: Vec<Result<Vec<u8>, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SpeechRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechProvider for ScriptedProvider {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(AUDIO.to_vec()))
    }

    async fn list_voices(&self, filter: &VoiceFilter) -> Result<Vec<VoiceInfo>, ProviderError> {
        Ok(filter.apply(Vec::new()))
    }
}

/// Media store whose disk is always full.
#[derive(Default)]
pub struct FullDiskMediaStore;

#[async_trait]
impl MediaStore for FullDiskMediaStore {
    async fn contains(&self, _filename: &str) -> Result<bool, MediaError> {
        Ok(false)
    }

    async fn write(&self, filename: &str, _data: &[u8]) -> Result<(), MediaError> {
        Err(MediaError::Io {
            filename: filename.to_string(),
            message: "No space left on device".to_string(),
        })
    }
}

pub fn service_unavailable() -> ProviderError {
    ProviderError::from_status(503, r#"{"code": "ServiceUnavailable", "message": "try later"}"#)
}

pub fn unauthorized() -> ProviderError {
    ProviderError::from_status(401, r#"{"code": "Unauthorized", "message": "invalid key"}"#)
}

pub fn bad_request() -> ProviderError {
    ProviderError::from_status(400, r#"{"code": "InvalidRequest", "message": "malformed ssml"}"#)
}
