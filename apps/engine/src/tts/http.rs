//! HTTP speech provider speaking the Azure Cognitive Services protocol.

use super::error::{ProviderError, TtsConfigError};
use super::provider::{SpeechProvider, SpeechRequest, VoiceFilter, VoiceInfo};
use crate::config::{SecretString, TtsConfig};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
pub const OUTPUT_FORMAT_HEADER: &str = "X-Microsoft-OutputFormat";

/// Speech provider reached over HTTPS.
pub struct HttpSpeechProvider {
    client: Client,
    synthesize_url: String,
    voices_url: String,
    key: SecretString,
    ssml_template: String,
    lang: String,
    rate: String,
}

impl HttpSpeechProvider {
    pub fn new(config: &TtsConfig) -> Result<Self, TtsConfigError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TtsConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            synthesize_url: join_url(&config.base_url, &config.synthesize_path),
            voices_url: join_url(&config.base_url, &config.voices_path),
            key: config.key.clone(),
            ssml_template: config.ssml_template.clone(),
            lang: config.lang.clone(),
            rate: config.rate.clone(),
        })
    }

    pub fn synthesize_url(&self) -> &str {
        &self.synthesize_url
    }

    /// SSML body for a request, with text and voice XML-escaped.
    pub fn render_ssml(&self, request: &SpeechRequest) -> String {
        self.ssml_template
            .replace("{lang}", &escape_xml(&self.lang))
            .replace("{rate}", &escape_xml(&self.rate))
            .replace("{voice}", &escape_xml(&request.voice))
            .replace("{text}", &escape_xml(&request.text))
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(ProviderError::from_status(status, &body))
    }
}

#[async_trait]
impl SpeechProvider for HttpSpeechProvider {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, ProviderError> {
        tracing::debug!(
            voice = %request.voice,
            text_length = request.text.len(),
            format = %request.output_format,
            "Calling speech provider"
        );

        let resp = self
            .client
            .post(&self.synthesize_url)
            .header(KEY_HEADER, self.key.expose())
            .header(OUTPUT_FORMAT_HEADER, &request.output_format)
            .header(reqwest::header::CONTENT_TYPE, "application/ssml+xml")
            .body(self.render_ssml(request))
            .send()
            .await?;

        let audio = Self::check(resp).await?.bytes().await?;
        if audio.is_empty() {
            return Err(ProviderError::Decode {
                message: "empty audio body".to_string(),
            });
        }
        Ok(audio.to_vec())
    }

    async fn list_voices(&self, filter: &VoiceFilter) -> Result<Vec<VoiceInfo>, ProviderError> {
        let resp = self
            .client
            .get(&self.voices_url)
            .header(KEY_HEADER, self.key.expose())
            .send()
            .await?;

        let voices: Vec<VoiceInfo> = Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Decode {
                message: e.to_string(),
            })?;

        tracing::debug!(total = voices.len(), "Voice list received");
        Ok(filter.apply(voices))
    }
}

/// Absolute paths are used as-is; anything else is appended to `base`.
fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
