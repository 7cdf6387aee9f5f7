//! Synthesis scan over a collection.

use super::error::{ProviderError, TtsConfigError, TtsFailure};
use super::markup;
use super::media::MediaStore;
use super::provider::{SpeechProvider, SpeechRequest};
use crate::collection::{Collection, NoteId};
use crate::config::TtsConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One field of one note that needs audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTask {
    pub note_id: NoteId,
    /// Field the text was read from.
    pub field_name: String,
    /// Field the sound marker is appended to.
    pub audio_field: String,
    /// Speakable text sent to the provider.
    pub text: String,
    pub voice: String,
    /// The audio field's value as read during the scan.
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub task: AudioTask,
    pub audio_checksum: String,
    pub media_filename: String,
    /// The media file already existed; no provider call was made.
    pub reused: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub task: AudioTask,
    pub reason: TtsFailure,
}

/// Outcome of one [`Synthesizer::synthesize`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisReport {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: Vec<TaskFailure>,
    pub completed: Vec<SynthesisResult>,
    pub cancelled: bool,
}

/// Tasks found by a scan, plus fields that already had audio.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub tasks: Vec<AudioTask>,
    pub resolved: usize,
}

/// Bounded exponential backoff for retryable provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Provider calls per task, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &TtsConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.retry_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

enum TaskOutcome {
    /// Carries the audio field's value after the marker was attached.
    Done(SynthesisResult, String),
    Failed(TtsFailure),
    CredentialsRejected(ProviderError),
    Cancelled,
}

/// Drives speech synthesis for collection fields.
pub struct Synthesizer<P, M> {
    provider: P,
    media: M,
    config: TtsConfig,
    retry: RetryPolicy,
}

impl<P, M> Synthesizer<P, M>
where
    P: SpeechProvider,
    M: MediaStore,
{
    pub fn new(provider: P, media: M, config: TtsConfig) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self {
            provider,
            media,
            config,
            retry,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    /// Checks made before any request. Fails on the first problem found.
    pub fn preflight<C>(&self, collection: &C) -> Result<(), TtsConfigError>
    where
        C: Collection + ?Sized,
    {
        if collection.is_empty()? {
            return Err(TtsConfigError::EmptyCollection);
        }
        validate_base_url(&self.config.base_url)?;

        let key = self.config.key.expose();
        if key.is_empty() {
            return Err(TtsConfigError::MissingKey);
        }
        if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TtsConfigError::InvalidKey);
        }
        if self.config.default_voice.trim().is_empty() {
            return Err(TtsConfigError::MissingVoice);
        }
        if self.config.fields.iter().all(|f| f.trim().is_empty()) {
            return Err(TtsConfigError::NoTargetFields);
        }
        Ok(())
    }

    /// Target fields of notes under `tag_filter` that still need audio.
    pub async fn scan<C>(&self, collection: &C, tag_filter: &str) -> Result<ScanOutcome, TtsConfigError>
    where
        C: Collection + ?Sized,
    {
        let notes = collection.list_notes_by_tag(tag_filter)?;
        let voice = self.config.default_voice.trim().to_string();
        let mut outcome = ScanOutcome::default();

        for note in &notes {
            for field_name in &self.config.fields {
                let Some(value) = note.field(field_name) else {
                    continue;
                };
                let text = markup::speakable_text(value);
                if text.is_empty() {
                    continue;
                }
                let audio_field = self.config.audio_field_for(field_name);
                let Some(target) = note.field(audio_field) else {
                    tracing::debug!(note_id = %note.id, field = audio_field, "Note has no audio field");
                    continue;
                };
                if self.has_resolved_audio(target).await {
                    outcome.resolved += 1;
                    continue;
                }
                outcome.tasks.push(AudioTask {
                    note_id: note.id,
                    field_name: field_name.clone(),
                    audio_field: audio_field.to_string(),
                    text,
                    voice: voice.clone(),
                    source: target.to_string(),
                });
            }
        }

        tracing::debug!(
            notes = notes.len(),
            tasks = outcome.tasks.len(),
            resolved = outcome.resolved,
            "Synthesis scan finished"
        );
        Ok(outcome)
    }

    /// Give every target field under `tag_filter` an audio reference.
    ///
    /// Only pre-flight problems are returned as errors; everything that
    /// goes wrong per task is in the report.
    pub async fn synthesize<C>(
        &self,
        collection: &mut C,
        tag_filter: &str,
        cancel: &CancellationToken,
    ) -> Result<SynthesisReport, TtsConfigError>
    where
        C: Collection + ?Sized,
    {
        if let Err(e) = self.preflight(&*collection) {
            tracing::error!(error = %e, "Speech synthesis pre-flight failed");
            return Err(e);
        }

        let scan = self.scan(&*collection, tag_filter).await?;
        let mut report = SynthesisReport {
            skipped: scan.resolved,
            ..SynthesisReport::default()
        };

        tracing::info!(
            tag = tag_filter,
            tasks = scan.tasks.len(),
            already_resolved = scan.resolved,
            "Starting speech synthesis"
        );

        // Audio field values patched so far; text fields may share one.
        let mut written: HashMap<(NoteId, String), String> = HashMap::new();
        let mut pending = scan.tasks.into_iter();
        while let Some(mut task) = pending.next() {
            if let Some(latest) = written.get(&(task.note_id, task.audio_field.clone())) {
                task.source = latest.clone();
            }
            if cancel.is_cancelled() {
                report.cancelled = true;
                fail_all(&mut report, task, pending.by_ref(), || TtsFailure::Cancelled);
                break;
            }

            match self.run_task(collection, &task, cancel).await {
                TaskOutcome::Done(result, field_value) => {
                    written.insert((task.note_id, task.audio_field.clone()), field_value);
                    if result.reused {
                        report.skipped += 1;
                    } else {
                        report.succeeded += 1;
                    }
                    report.completed.push(result);
                }
                TaskOutcome::Failed(reason) => {
                    tracing::warn!(
                        note_id = %task.note_id,
                        field = %task.field_name,
                        error = %reason,
                        "Audio task failed"
                    );
                    report.failed.push(TaskFailure { task, reason });
                }
                TaskOutcome::CredentialsRejected(error) => {
                    tracing::error!(error = %error, "Speech provider rejected the credentials, abandoning remaining tasks");
                    report.failed.push(TaskFailure {
                        task,
                        reason: TtsFailure::Auth { error },
                    });
                    for task in pending.by_ref() {
                        report.failed.push(TaskFailure {
                            task,
                            reason: TtsFailure::AbortedByAuthFailure,
                        });
                    }
                    break;
                }
                TaskOutcome::Cancelled => {
                    report.cancelled = true;
                    fail_all(&mut report, task, pending.by_ref(), || TtsFailure::Cancelled);
                    break;
                }
            }
        }

        tracing::info!(
            succeeded = report.succeeded,
            skipped = report.skipped,
            failed = report.failed.len(),
            cancelled = report.cancelled,
            "Speech synthesis finished"
        );

        Ok(report)
    }

    async fn has_resolved_audio(&self, value: &str) -> bool {
        for filename in markup::sound_references(value) {
            match self.media.contains(&filename).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(filename = %filename, error = %e, "Cannot check media file");
                }
            }
        }
        false
    }

    async fn run_task<C>(&self, collection: &mut C, task: &AudioTask, cancel: &CancellationToken) -> TaskOutcome
    where
        C: Collection + ?Sized,
    {
        let checksum = markup::audio_checksum(&task.text, &task.voice);
        let filename = markup::media_filename(
            &checksum,
            &task.voice,
            markup::extension_for(&self.config.output_format),
        );

        let reused = match self.media.contains(&filename).await {
            Ok(found) => found,
            Err(error) => return TaskOutcome::Failed(TtsFailure::Media { error }),
        };

        if !reused {
            let request = SpeechRequest {
                text: task.text.clone(),
                voice: task.voice.clone(),
                output_format: self.config.output_format.clone(),
            };
            let audio = match self.request_audio(&request, cancel).await {
                Ok(audio) => audio,
                Err(outcome) => return outcome,
            };
            if let Err(error) = self.media.write(&filename, &audio).await {
                return TaskOutcome::Failed(TtsFailure::Media { error });
            }
        }

        let marker = markup::render_marker(&self.config.marker_format, &filename);
        let mut field_value = task.source.clone();
        if !task.source.contains(marker.trim()) {
            if field_value.trim().is_empty() {
                field_value = marker.trim_start().to_string();
            } else {
                field_value.push_str(&marker);
            }
            if let Err(error) = collection.patch_field(task.note_id, &task.audio_field, &field_value) {
                return TaskOutcome::Failed(TtsFailure::Collection { error });
            }
        }

        tracing::debug!(note_id = %task.note_id, filename = %filename, reused, "Audio attached");
        TaskOutcome::Done(
            SynthesisResult {
                task: task.clone(),
                audio_checksum: checksum,
                media_filename: filename,
                reused,
            },
            field_value,
        )
    }

    async fn request_audio(
        &self,
        request: &SpeechRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TaskOutcome> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match self.provider.synthesize(request).await {
                Ok(audio) => return Ok(audio),
                Err(error) => error,
            };

            if error.is_fatal() {
                return Err(TaskOutcome::CredentialsRejected(error));
            }
            if !error.is_retryable() || attempt >= self.retry.max_attempts {
                return Err(TaskOutcome::Failed(TtsFailure::Provider {
                    attempts: attempt,
                    error,
                }));
            }

            let delay = self.retry.backoff_for(attempt);
            tracing::warn!(
                attempt,
                max_attempts = self.retry.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Speech request failed, retrying"
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(TaskOutcome::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

fn fail_all<I, F>(report: &mut SynthesisReport, first: AudioTask, rest: I, reason: F)
where
    I: Iterator<Item = AudioTask>,
    F: Fn() -> TtsFailure,
{
    for task in std::iter::once(first).chain(rest) {
        report.failed.push(TaskFailure {
            task,
            reason: reason(),
        });
    }
}

fn validate_base_url(base_url: &str) -> Result<(), TtsConfigError> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(TtsConfigError::MissingBaseUrl);
    }
    let invalid = |reason: String| TtsConfigError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason,
    };
    let url = reqwest::Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(())
}
