pub mod captions;
pub mod config;
pub mod error;
pub mod http;
pub mod language;
pub mod normalize;
pub mod orchestrator;
pub mod server;
pub mod strategy;
pub mod translate;

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

pub use error::{Failure, FailureKind};

/// URL patterns tried in order; the first capture wins
static VIDEO_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"v=([a-zA-Z0-9_-]{11})",
        r"youtu\.be/([a-zA-Z0-9_-]{11})",
        r"shorts/([a-zA-Z0-9_-]{11})",
        r"embed/([a-zA-Z0-9_-]{11})",
        r"live/([a-zA-Z0-9_-]{11})",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static BARE_VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").unwrap());

/// Validated 11-character YouTube video id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Parse a URL or bare id, failing with `InvalidInput`
    pub fn parse(input: &str) -> Result<Self, Failure> {
        extract_video_id(input).ok_or_else(|| Failure::InvalidInput(format!("could not extract video ID from: {input}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract video ID from various YouTube URL formats
pub fn extract_video_id(input: &str) -> Option<VideoId> {
    if let Some(caps) = VIDEO_ID_PATTERNS.iter().find_map(|re| re.captures(input)) {
        return Some(VideoId(caps[1].to_string()));
    }

    // Bare 11-character video ID
    let input = input.trim();
    if BARE_VIDEO_ID.is_match(input) {
        return Some(VideoId(input.to_string()));
    }

    None
}

/// Render a seconds offset as `M:SS`, or `H:MM:SS` past the hour
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds as u64 } else { 0 };
    let (hours, rem) = (total / 3600, total % 3600);
    let (minutes, secs) = (rem / 60, rem % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Round to two decimals, clamping negatives to zero
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return 0.0;
    }
    (value * 100.0).round() / 100.0
}

/// A single captioned line in canonical form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptLine {
    pub text: String,
    pub start: f64,
    pub duration: f64,
    pub formatted_time: String,
}

/// Complete transcript for a video.
///
/// `full_text` and `word_count` are always derived from `lines`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    pub video_id: VideoId,
    pub lines: Vec<TranscriptLine>,
    pub full_text: String,
    pub word_count: usize,
    pub language: String,
}

impl Transcript {
    /// Build a transcript, rejecting an empty line list
    pub fn from_lines(video_id: VideoId, language: impl Into<String>, lines: Vec<TranscriptLine>) -> Result<Self, Failure> {
        if lines.is_empty() {
            return Err(Failure::NotFound(format!("no transcript lines for video {video_id}")));
        }

        let full_text = lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>().join(" ");
        let word_count = full_text.split_whitespace().count();

        Ok(Transcript {
            video_id,
            lines,
            full_text,
            word_count,
            language: language.into(),
        })
    }
}

/// A caption track offered for a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptionTrackDescriptor {
    pub code: String,
    pub name: String,
    pub auto_generated: bool,
}

impl CaptionTrackDescriptor {
    pub fn new(code: impl Into<String>, name: Option<String>, auto_generated: bool) -> Self {
        let code = code.into();
        let name = name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| code.clone());
        Self {
            code,
            name,
            auto_generated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(input: &str) -> Option<String> {
        extract_video_id(input).map(|v| v.to_string())
    }

    fn line(text: &str, start: f64) -> TranscriptLine {
        TranscriptLine {
            text: text.to_string(),
            start,
            duration: 1.0,
            formatted_time: format_time(start),
        }
    }

    #[test]
    fn test_bare_video_id() {
        assert_eq!(id("dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".to_string()));
    }

    #[test]
    fn test_watch_url() {
        assert_eq!(
            id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_watch_url_with_extra_params() {
        assert_eq!(
            id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=120"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_short_url() {
        assert_eq!(id("https://youtu.be/dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".to_string()));
    }

    #[test]
    fn test_embed_url() {
        assert_eq!(
            id("https://www.youtube.com/embed/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_shorts_url() {
        assert_eq!(
            id("https://www.youtube.com/shorts/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_live_url() {
        assert_eq!(
            id("https://www.youtube.com/live/dQw4w9WgXcQ?si=abc"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_id_case_preserved() {
        assert_eq!(id("https://youtu.be/AbCdEfGhIjK"), Some("AbCdEfGhIjK".to_string()));
    }

    #[test]
    fn test_invalid_url() {
        assert_eq!(id("not-a-valid-id"), None);
        assert_eq!(id("https://example.com/watch"), None);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(id(""), None);
    }

    #[test]
    fn test_whitespace_trimming() {
        assert_eq!(id("  dQw4w9WgXcQ  "), Some("dQw4w9WgXcQ".to_string()));
    }

    #[test]
    fn test_parse_invalid_is_invalid_input() {
        let err = VideoId::parse("nope").unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidInput);
    }

    #[test]
    fn test_watch_url_from_id() {
        let v = VideoId::parse("dQw4w9WgXcQ").unwrap();
        assert_eq!(v.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(65.0), "1:05");
        assert_eq!(format_time(3661.0), "1:01:01");
        assert_eq!(format_time(59.99), "0:59");
        assert_eq!(format_time(-5.0), "0:00");
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(2.345_001), 2.35);
        assert_eq!(round2(-1.0), 0.0);
        assert_eq!(round2(f64::NAN), 0.0);
    }

    #[test]
    fn test_transcript_derives_text_and_word_count() {
        let vid = VideoId::parse("dQw4w9WgXcQ").unwrap();
        let t = Transcript::from_lines(vid, "en", vec![line("Hello world", 0.0), line("this is  a test", 1.5)]).unwrap();
        assert_eq!(t.full_text, "Hello world this is  a test");
        assert_eq!(t.word_count, 6);
        assert_eq!(t.language, "en");
    }

    #[test]
    fn test_transcript_rejects_empty() {
        let vid = VideoId::parse("dQw4w9WgXcQ").unwrap();
        let err = Transcript::from_lines(vid, "en", vec![]).unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFound);
    }

    #[test]
    fn test_descriptor_name_falls_back_to_code() {
        let d = CaptionTrackDescriptor::new("fr", None, false);
        assert_eq!(d.name, "fr");
        let d = CaptionTrackDescriptor::new("fr", Some("French".to_string()), true);
        assert_eq!(d.name, "French");
        assert!(d.auto_generated);
    }
}
