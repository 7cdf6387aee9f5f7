//! Engine configuration.
//!
//! Every operation takes its configuration explicitly; nothing here is
//! global. Values deserialize from JSON with per-field defaults, so a
//! partial document only overrides what it names.

use quiz_core::QuestionType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_TTS_BASE_URL: &str = "QUIZDECK_TTS_BASE_URL";
pub const ENV_TTS_KEY: &str = "QUIZDECK_TTS_KEY";
pub const ENV_TTS_VOICE: &str = "QUIZDECK_TTS_VOICE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// A string that never shows up in logs or `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("SecretString(\"\")")
        } else {
            f.write_str("SecretString(***)")
        }
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub import: ImportConfig,
    pub tts: TtsConfig,
    pub journal: JournalConfig,
}

impl Config {
    /// Parse a JSON document, filling gaps with defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Overlay provider settings from the environment (and `.env`, if present).
    pub fn apply_env(&mut self) {
        dotenvy::dotenv().ok();
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_TTS_BASE_URL) {
            self.tts.base_url = url;
        }
        if let Some(key) = lookup(ENV_TTS_KEY) {
            self.tts.key = SecretString::new(key);
        }
        if let Some(voice) = lookup(ENV_TTS_VOICE) {
            self.tts.default_voice = voice;
        }
    }
}

/// Note field names written by the importer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    pub stem: String,
    pub options: String,
    pub answer: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            stem: "Front".to_string(),
            options: "Options".to_string(),
            answer: "Back".to_string(),
        }
    }
}

/// Settings for turning parsed questions into notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Separator inside multi-tag strings.
    pub tag_separator: String,
    /// Separator between deck hierarchy levels.
    pub hierarchy_separator: String,
    /// Trailing hierarchy levels that form the chapter tag.
    pub chapter_depth: usize,
    /// Regex removed from each chapter level (ordering prefixes like `01-`).
    pub chapter_prefix_strip: String,
    pub add_chapter_tag: bool,
    /// Nest the question's own tags under its chapter tag.
    pub nest_tags_under_chapter: bool,
    pub add_type_tag: bool,
    pub type_tag_prefix: String,
    /// Tags added to every imported note; each entry may hold several.
    pub base_tags: Vec<String>,
    /// Deck used when the text declares none.
    pub default_deck: String,
    /// Note type per question type; unmapped types use the type name.
    pub note_types: BTreeMap<QuestionType, String>,
    pub fields: FieldNames,
    pub option_joiner: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            tag_separator: " ".to_string(),
            hierarchy_separator: "::".to_string(),
            chapter_depth: 1,
            chapter_prefix_strip: r"^\d+[\-_.]+".to_string(),
            add_chapter_tag: true,
            nest_tags_under_chapter: false,
            add_type_tag: true,
            type_tag_prefix: "type::".to_string(),
            base_tags: Vec::new(),
            default_deck: "Default".to_string(),
            note_types: BTreeMap::new(),
            fields: FieldNames::default(),
            option_joiner: "\n".to_string(),
        }
    }
}

impl ImportConfig {
    pub fn note_type_for(&self, question_type: QuestionType) -> String {
        self.note_types
            .get(&question_type)
            .cloned()
            .unwrap_or_else(|| question_type.as_str().to_string())
    }
}

/// Settings for the speech provider and the synthesis scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub base_url: String,
    pub key: SecretString,
    pub default_voice: String,
    /// Note fields whose text is spoken.
    pub fields: BTreeSet<String>,
    /// Field that receives the sound marker for a text field; the text
    /// field itself when absent.
    pub audio_fields: BTreeMap<String, String>,
    pub synthesize_path: String,
    pub voices_path: String,
    pub output_format: String,
    pub ssml_template: String,
    pub lang: String,
    pub rate: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
    /// Provider attempts per task, including the first.
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Field markup appended after synthesis; `{filename}` is substituted.
    pub marker_format: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            key: SecretString::default(),
            default_voice: "en-GB-SoniaNeural".to_string(),
            fields: BTreeSet::from(["Front".to_string()]),
            audio_fields: BTreeMap::new(),
            synthesize_path: "/cognitiveservices/v1".to_string(),
            voices_path: "/cognitiveservices/voices/list".to_string(),
            output_format: "audio-24khz-48kbitrate-mono-mp3".to_string(),
            ssml_template: concat!(
                "<speak version=\"1.0\" xml:lang=\"{lang}\">",
                "<voice name=\"{voice}\"><prosody rate=\"{rate}\">{text}</prosody></voice>",
                "</speak>"
            )
            .to_string(),
            lang: "en-US".to_string(),
            rate: "1.0".to_string(),
            user_agent: "quizdeck".to_string(),
            timeout_seconds: 20,
            max_attempts: 3,
            retry_backoff_ms: 500,
            max_backoff_ms: 8_000,
            marker_format: " [sound:{filename}]".to_string(),
        }
    }
}

impl TtsConfig {
    /// Field that stores the audio for `text_field`.
    pub fn audio_field_for<'a>(&'a self, text_field: &'a str) -> &'a str {
        self.audio_fields
            .get(text_field)
            .map(String::as_str)
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(text_field)
    }
}

/// Settings for the import journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Sessions kept after each import; `0` keeps all.
    pub keep_limit: usize,
    /// Journal database; the platform data directory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            keep_limit: 20,
            path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = Config::from_json_str(
            r#"{"import": {"tag_separator": ","}, "tts": {"base_url": "https://tts.example.com"}}"#,
        )
        .unwrap();
        assert_eq!(config.import.tag_separator, ",");
        assert_eq!(config.import.hierarchy_separator, "::");
        assert_eq!(config.tts.base_url, "https://tts.example.com");
        assert_eq!(config.tts.max_attempts, 3);
        assert_eq!(config.journal.keep_limit, 20);
    }

    #[test]
    fn note_types_map_by_question_type() {
        let config = Config::from_json_str(
            r#"{"import": {"note_types": {"fill_blank": "Cloze"}}}"#,
        )
        .unwrap();
        assert_eq!(config.import.note_type_for(QuestionType::FillBlank), "Cloze");
        assert_eq!(
            config.import.note_type_for(QuestionType::MultiChoice),
            "multi_choice"
        );
    }

    #[test]
    fn audio_field_defaults_to_the_text_field() {
        let config = Config::from_json_str(
            r#"{"tts": {"fields": ["Front", "Back"], "audio_fields": {"Front": "Audio", "Back": " "}}}"#,
        )
        .unwrap();
        assert_eq!(config.tts.audio_field_for("Front"), "Audio");
        assert_eq!(config.tts.audio_field_for("Back"), "Back");
        assert_eq!(TtsConfig::default().audio_field_for("Front"), "Front");
    }

    #[test]
    fn invalid_json_is_an_error() {
        let result = Config::from_json_str("{not json");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_missing_file_names_path() {
        let err = Config::load("/no/such/quizdeck.json").unwrap_err();
        assert!(err.to_string().contains("/no/such/quizdeck.json"));
    }

    #[test]
    fn secret_is_redacted_in_debug() {
        let secret = SecretString::new("hunter2");
        assert_eq!(format!("{:?}", secret), "SecretString(***)");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn env_overrides_provider_settings() {
        let mut config = Config::default();
        config.apply_env_from(|name| match name {
            ENV_TTS_BASE_URL => Some("https://eastus.tts.example.com".to_string()),
            ENV_TTS_KEY => Some("abc123".to_string()),
            _ => None,
        });
        assert_eq!(config.tts.base_url, "https://eastus.tts.example.com");
        assert_eq!(config.tts.key.expose(), "abc123");
        assert_eq!(config.tts.default_voice, "en-GB-SoniaNeural");
    }
}
