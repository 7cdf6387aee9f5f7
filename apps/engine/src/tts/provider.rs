//! Speech provider capability and voice catalogue types.

use super::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One synthesis call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    pub output_format: String,
}

/// A voice offered by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VoiceInfo {
    pub short_name: String,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub locale_name: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub voice_type: String,
}

/// Narrows a voice listing. Unset criteria match everything; set ones
/// compare ASCII case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceFilter {
    pub locale: Option<String>,
    pub gender: Option<String>,
    pub voice_type: Option<String>,
}

impl VoiceFilter {
    pub fn matches(&self, voice: &VoiceInfo) -> bool {
        fn accepts(wanted: &Option<String>, actual: &str) -> bool {
            match wanted.as_deref().map(str::trim) {
                None | Some("") => true,
                Some(w) => w.eq_ignore_ascii_case(actual.trim()),
            }
        }

        accepts(&self.locale, &voice.locale)
            && accepts(&self.gender, &voice.gender)
            && accepts(&self.voice_type, &voice.voice_type)
    }

    /// Matching voices sorted by locale, then short name.
    pub fn apply(&self, voices: Vec<VoiceInfo>) -> Vec<VoiceInfo> {
        let mut kept: Vec<VoiceInfo> = voices.into_iter().filter(|v| self.matches(v)).collect();
        kept.sort_by(|a, b| {
            a.locale
                .cmp(&b.locale)
                .then_with(|| a.short_name.cmp(&b.short_name))
        });
        kept
    }
}

/// Text-to-speech backend.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Audio bytes for the request in its output format.
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, ProviderError>;

    async fn list_voices(&self, filter: &VoiceFilter) -> Result<Vec<VoiceInfo>, ProviderError>;
}
