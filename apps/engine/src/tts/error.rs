//! Speech synthesis error types.

use crate::collection::CollectionError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a speech provider.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderError {
    #[error("network error: {message}")]
    Transport { message: String },

    #[error("authentication failed ({status}): {message}")]
    Auth {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("request rejected ({status}): {message}")]
    Invalid {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("provider error ({status}): {message}")]
    Service {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("unexpected provider response: {message}")]
    Decode { message: String },
}

/// Structured error body, either flat or nested under `error`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<serde_json::Value>,
    message: Option<String>,
    error: Option<Box<ErrorBody>>,
}

impl ErrorBody {
    fn into_parts(self) -> (Option<String>, Option<String>) {
        if let Some(inner) = self.error {
            let (code, message) = inner.into_parts();
            if code.is_some() || message.is_some() {
                return (code, message);
            }
        }
        let code = self.code.map(|c| match c {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
        (code, self.message)
    }
}

impl ProviderError {
    /// Classify a non-success HTTP response.
    pub fn from_status(status: u16, body: &str) -> Self {
        let (code, message) = serde_json::from_str::<ErrorBody>(body)
            .map(ErrorBody::into_parts)
            .unwrap_or((None, None));
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    format!("HTTP {status}")
                } else {
                    trimmed.chars().take(200).collect()
                }
            });

        match status {
            401 | 403 => Self::Auth {
                status,
                code,
                message,
            },
            408 | 429 => Self::Service {
                status,
                code,
                message,
            },
            400..=499 => Self::Invalid {
                status,
                code,
                message,
            },
            _ => Self::Service {
                status,
                code,
                message,
            },
        }
    }

    /// Worth another attempt with the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Service { status, .. } => matches!(status, 408 | 429) || *status >= 500,
            _ => false,
        }
    }

    /// No request with the same credentials can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::Invalid { .. })
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport {
            message: e.to_string(),
        }
    }
}

/// Failure of the media store.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaError {
    #[error("invalid media filename: {filename}")]
    InvalidName { filename: String },

    #[error("media store error for {filename}: {message}")]
    Io { filename: String, message: String },
}

/// Pre-flight failure. Nothing has been requested or written when one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TtsConfigError {
    #[error("the collection has no notes")]
    EmptyCollection,

    #[error("speech provider base_url is not set")]
    MissingBaseUrl,

    #[error("speech provider base_url {url:?} is invalid: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("speech provider key is not set")]
    MissingKey,

    #[error("speech provider key contains whitespace or control characters")]
    InvalidKey,

    #[error("no voice configured")]
    MissingVoice,

    #[error("no target fields configured")]
    NoTargetFields,

    #[error("cannot read the collection: {0}")]
    Collection(#[from] CollectionError),

    #[error("cannot build HTTP client: {0}")]
    HttpClient(String),
}

/// Why one audio task did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TtsFailure {
    #[error("provider failed after {attempts} attempt(s): {error}")]
    Provider { attempts: u32, error: ProviderError },

    #[error("credentials rejected: {error}")]
    Auth { error: ProviderError },

    #[error("not attempted after the credentials were rejected")]
    AbortedByAuthFailure,

    #[error("{error}")]
    Media { error: MediaError },

    #[error("cannot update note: {error}")]
    Collection { error: CollectionError },

    #[error("cancelled")]
    Cancelled,
}
