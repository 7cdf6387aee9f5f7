//! Field text handling: speakable text, sound markers and media names.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

static SOUND_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[sound:([^\]]+)\]").expect("sound marker pattern"));
static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>|</(p|div|li)>").expect("line break pattern"));
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("html tag pattern"));

/// The text a field would be read aloud as.
pub fn speakable_text(raw: &str) -> String {
    let text = SOUND_MARKER.replace_all(raw, " ");
    let text = LINE_BREAK.replace_all(&text, " ");
    let text = HTML_TAG.replace_all(&text, "");
    let text = decode_entities(&text);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Filenames referenced by `[sound:...]` markers, in field order.
pub fn sound_references(raw: &str) -> Vec<String> {
    SOUND_MARKER
        .captures_iter(raw)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// SHA-256 over `voice`, a unit separator, then `text`.
pub fn audio_checksum(text: &str, voice: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(voice.as_bytes());
    hasher.update([0x1f]);
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Voice ids end up in filenames; anything outside `[A-Za-z0-9_-]` becomes `_`.
pub fn sanitize_voice(voice: &str) -> String {
    voice
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn media_filename(checksum: &str, voice: &str, extension: &str) -> String {
    format!("{}-{}.{}", checksum, sanitize_voice(voice), extension)
}

/// File extension for a provider output format name.
pub fn extension_for(output_format: &str) -> &'static str {
    let format = output_format.to_ascii_lowercase();
    if format.starts_with("riff") || format.ends_with("wav") {
        "wav"
    } else if format.starts_with("ogg") {
        "ogg"
    } else if format.starts_with("webm") {
        "webm"
    } else if format.starts_with("raw") || format.ends_with("pcm") {
        "pcm"
    } else {
        "mp3"
    }
}

pub fn render_marker(marker_format: &str, filename: &str) -> String {
    marker_format.replace("{filename}", filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn speakable_text_strips_markup() {
        assert_eq!(
            speakable_text("<b>Hello</b>&nbsp;world<br/>again [sound:abc.mp3]"),
            "Hello world again"
        );
        assert_eq!(speakable_text("Tom &amp; Jerry &lt;3"), "Tom & Jerry <3");
        assert_eq!(speakable_text("[sound:only.mp3]"), "");
    }

    #[test]
    fn sound_references_in_order() {
        assert_eq!(
            sound_references("a [sound:one.mp3] b [sound: two.wav ] [sound:]"),
            vec!["one.mp3".to_string(), "two.wav".to_string()]
        );
    }

    #[test]
    fn checksum_depends_on_voice_and_text() {
        let a = audio_checksum("hello", "en-US-A");
        assert_eq!(a.len(), 64);
        assert_eq!(a, audio_checksum("hello", "en-US-A"));
        assert_ne!(a, audio_checksum("hello", "en-US-B"));
        assert_ne!(a, audio_checksum("hello!", "en-US-A"));
    }

    #[test]
    fn filename_is_safe() {
        assert_eq!(
            media_filename("abc", "en-US/Jenny Neural", "mp3"),
            "abc-en-US_Jenny_Neural.mp3"
        );
    }

    #[test]
    fn extensions_follow_format() {
        assert_eq!(extension_for("audio-24khz-48kbitrate-mono-mp3"), "mp3");
        assert_eq!(extension_for("riff-24khz-16bit-mono-pcm"), "wav");
        assert_eq!(extension_for("ogg-48khz-16bit-mono-opus"), "ogg");
        assert_eq!(extension_for("webm-24khz-16bit-mono-opus"), "webm");
        assert_eq!(extension_for("raw-16khz-16bit-mono-pcm"), "pcm");
    }

    #[test]
    fn marker_substitutes_filename() {
        assert_eq!(render_marker(" [sound:{filename}]", "x.mp3"), " [sound:x.mp3]");
    }
}
