//! HTTP speech provider tests against a local stand-in service.

mod common;

use std::net::SocketAddr;

use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pretty_assertions::assert_eq;
use quizdeck_engine::tts::http::{KEY_HEADER, OUTPUT_FORMAT_HEADER};
use quizdeck_engine::tts::{
    FsMediaStore, HttpSpeechProvider, ProviderError, SpeechProvider, SpeechRequest, Synthesizer,
    VoiceFilter,
};
use quizdeck_engine::{SecretString, TtsConfig};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::fixtures::vocab_collection;

const GOOD_KEY: &str = "good-key";

async fn synthesize(headers: HeaderMap, body: String) -> Response {
    if headers.get(KEY_HEADER).and_then(|v| v.to_str().ok()) != Some(GOOD_KEY) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"code": "Unauthorized", "message": "invalid subscription key"})),
        )
            .into_response();
    }
    let format = headers
        .get(OUTPUT_FORMAT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if format != "audio-24khz-48kbitrate-mono-mp3" {
        return (StatusCode::BAD_REQUEST, "unsupported format").into_response();
    }
    if body.contains("overload") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "").into_response();
    }
    if !body.starts_with("<speak") {
        return (StatusCode::BAD_REQUEST, "expected ssml").into_response();
    }
    (StatusCode::OK, Bytes::from_static(b"ID3-audio")).into_response()
}

async fn voices(headers: HeaderMap) -> Response {
    if headers.get(KEY_HEADER).and_then(|v| v.to_str().ok()) != Some(GOOD_KEY) {
        return StatusCode::FORBIDDEN.into_response();
    }
    Json(json!([
        {"ShortName": "en-US-JennyNeural", "Locale": "en-US", "Gender": "Female", "VoiceType": "Neural"},
        {"ShortName": "en-US-GuyNeural", "Locale": "en-US", "Gender": "Male", "VoiceType": "Neural"},
        {"ShortName": "en-GB-SoniaNeural", "Locale": "en-GB", "Gender": "Female", "VoiceType": "Neural"}
    ]))
    .into_response()
}

async fn spawn_service() -> SocketAddr {
    let app = Router::new()
        .route("/cognitiveservices/v1", post(synthesize))
        .route("/cognitiveservices/voices/list", get(voices));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config(addr: SocketAddr, key: &str) -> TtsConfig {
    TtsConfig {
        base_url: format!("http://{addr}"),
        key: SecretString::new(key),
        retry_backoff_ms: 1,
        max_backoff_ms: 2,
        ..TtsConfig::default()
    }
}

fn request(text: &str) -> SpeechRequest {
    SpeechRequest {
        text: text.to_string(),
        voice: "en-US-JennyNeural".to_string(),
        output_format: "audio-24khz-48kbitrate-mono-mp3".to_string(),
    }
}

#[tokio::test]
async fn synthesize_returns_audio() {
    let addr = spawn_service().await;
    let provider = HttpSpeechProvider::new(&config(addr, GOOD_KEY)).unwrap();

    let audio = provider.synthesize(&request("hello")).await.unwrap();
    assert_eq!(audio, b"ID3-audio".to_vec());
}

#[tokio::test]
async fn bad_key_is_an_auth_error() {
    let addr = spawn_service().await;
    let provider = HttpSpeechProvider::new(&config(addr, "wrong")).unwrap();

    let err = provider.synthesize(&request("hello")).await.unwrap_err();
    assert_eq!(
        err,
        ProviderError::Auth {
            status: 401,
            code: Some("Unauthorized".to_string()),
            message: "invalid subscription key".to_string(),
        }
    );
    assert!(err.is_fatal());
}

#[tokio::test]
async fn server_error_is_retryable() {
    let addr = spawn_service().await;
    let provider = HttpSpeechProvider::new(&config(addr, GOOD_KEY)).unwrap();

    let err = provider.synthesize(&request("overload")).await.unwrap_err();
    assert!(matches!(err, ProviderError::Service { status: 500, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn unreachable_host_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let provider = HttpSpeechProvider::new(&config(addr, GOOD_KEY)).unwrap();

    let err = provider.synthesize(&request("hello")).await.unwrap_err();
    assert!(matches!(err, ProviderError::Transport { .. }));
}

#[tokio::test]
async fn voices_are_filtered() {
    let addr = spawn_service().await;
    let provider = HttpSpeechProvider::new(&config(addr, GOOD_KEY)).unwrap();

    let filter = VoiceFilter {
        locale: Some("en-US".to_string()),
        gender: Some("Female".to_string()),
        voice_type: None,
    };
    let voices = provider.list_voices(&filter).await.unwrap();
    let names: Vec<&str> = voices.iter().map(|v| v.short_name.as_str()).collect();
    assert_eq!(names, vec!["en-US-JennyNeural"]);

    let all = provider.list_voices(&VoiceFilter::default()).await.unwrap();
    assert_eq!(all.len(), 3);

    let denied = HttpSpeechProvider::new(&config(addr, "wrong")).unwrap();
    assert!(matches!(
        denied.list_voices(&filter).await,
        Err(ProviderError::Auth { status: 403, .. })
    ));
}

#[tokio::test]
async fn end_to_end_writes_media_files() {
    common::init();
    let addr = spawn_service().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(addr, GOOD_KEY);
    let provider = HttpSpeechProvider::new(&config).unwrap();
    let synth = Synthesizer::new(provider, FsMediaStore::new(dir.path()), config);
    let (mut collection, ids) = vocab_collection(&["hello", "goodbye"]);

    let report = synth
        .synthesize(&mut collection, "english", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.succeeded, 2);
    for result in &report.completed {
        let bytes = std::fs::read(dir.path().join(&result.media_filename)).unwrap();
        assert_eq!(bytes, b"ID3-audio".to_vec());
        assert!(result.media_filename.ends_with("-en-GB-SoniaNeural.mp3"));
    }
    let front = collection.get(ids[1]).unwrap().field("Front").unwrap();
    assert!(front.starts_with("goodbye [sound:"));

    let again = synth
        .synthesize(&mut collection, "english", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(again.skipped, 2);
    assert_eq!(again.succeeded, 0);
}
