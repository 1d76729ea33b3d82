use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use super::AcquisitionStrategy;
use crate::captions::CaptionSource;
use crate::language::probe_languages;
use crate::normalize::{RawCaptions, normalize};
use crate::{Failure, Transcript, VideoId};

pub struct LibraryStrategy {
    source: Arc<dyn CaptionSource>,
    label: &'static str,
}

impl LibraryStrategy {
    pub fn direct(source: Arc<dyn CaptionSource>) -> Self {
        Self {
            source,
            label: "direct-library",
        }
    }

    /// `source` must already route its requests through the proxy
    pub fn proxied(source: Arc<dyn CaptionSource>) -> Self {
        Self {
            source,
            label: "proxy-library",
        }
    }
}

#[async_trait]
impl AcquisitionStrategy for LibraryStrategy {
    fn label(&self) -> &str {
        self.label
    }

    async fn attempt(&self, video_id: &VideoId, language: &str) -> Result<Transcript, Failure> {
        // Requested code, then English variants, then selector precedence
        let (track, cues) = self.source.fetch(video_id, &probe_languages(language)).await?;
        debug!(
            "{}: using track lang={} (auto: {})",
            self.label,
            track.language_code,
            track.kind.as_deref() == Some("asr")
        );

        let lines = normalize(RawCaptions::Native(cues))?;
        Transcript::from_lines(video_id.clone(), track.language_code.clone(), lines)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::FailureKind;
    use crate::captions::CaptionTrack;
    use crate::normalize::CaptionCue;

    struct FakeSource {
        tracks: Result<Vec<CaptionTrack>, Failure>,
        fetched: Mutex<Vec<String>>,
        empty: bool,
    }

    impl FakeSource {
        fn with(tracks: &[(&str, bool)]) -> Self {
            Self {
                tracks: Ok(tracks
                    .iter()
                    .map(|(code, asr)| CaptionTrack {
                        base_url: format!("https://example.com/{code}"),
                        language_code: code.to_string(),
                        kind: asr.then(|| "asr".to_string()),
                        name: None,
                    })
                    .collect()),
                fetched: Mutex::new(Vec::new()),
                empty: false,
            }
        }
    }

    #[async_trait]
    impl CaptionSource for FakeSource {
        async fn list(&self, _video_id: &VideoId) -> Result<Vec<CaptionTrack>, Failure> {
            self.tracks.clone()
        }

        async fn fetch_track(&self, track: &CaptionTrack) -> Result<Vec<CaptionCue>, Failure> {
            self.fetched.lock().unwrap().push(track.language_code.clone());
            if self.empty {
                return Ok(vec![]);
            }
            Ok(vec![
                CaptionCue {
                    text: format!("line in {}", track.language_code),
                    start: 0.004,
                    duration: 1.996,
                },
                CaptionCue {
                    text: "second".to_string(),
                    start: 62.5,
                    duration: 3.0,
                },
            ])
        }
    }

    fn vid() -> VideoId {
        VideoId::parse("dQw4w9WgXcQ").unwrap()
    }

    #[tokio::test]
    async fn test_requested_language() {
        let source = Arc::new(FakeSource::with(&[("en", true), ("de", false)]));
        let s = LibraryStrategy::direct(source.clone());
        let t = s.attempt(&vid(), "de").await.unwrap();
        assert_eq!(t.language, "de");
        assert_eq!(t.lines[0].text, "line in de");
        assert_eq!(t.lines[0].start, 0.0);
        assert_eq!(t.lines[0].duration, 2.0);
        assert_eq!(t.lines[1].formatted_time, "1:02");
        assert_eq!(*source.fetched.lock().unwrap(), vec!["de"]);
    }

    #[tokio::test]
    async fn test_english_variant_probe() {
        let source = Arc::new(FakeSource::with(&[("fr", false), ("en-GB", false)]));
        let t = LibraryStrategy::direct(source).attempt(&vid(), "ja").await.unwrap();
        assert_eq!(t.language, "en-GB");
    }

    #[tokio::test]
    async fn test_manual_before_auto_on_total_miss() {
        let source = Arc::new(FakeSource::with(&[("de", true), ("fr", false)]));
        let t = LibraryStrategy::proxied(source).attempt(&vid(), "ja").await.unwrap();
        assert_eq!(t.language, "fr");
    }

    #[tokio::test]
    async fn test_list_failure_propagates_classified() {
        let mut source = FakeSource::with(&[]);
        source.tracks = Err(Failure::Blocked("429".to_string()));
        let err = LibraryStrategy::direct(Arc::new(source)).attempt(&vid(), "en").await.unwrap_err();
        assert!(err.is_blocked());
    }

    #[tokio::test]
    async fn test_empty_track_is_failure() {
        let mut source = FakeSource::with(&[("en", false)]);
        source.empty = true;
        let err = LibraryStrategy::direct(Arc::new(source)).attempt(&vid(), "en").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFound);
    }

    #[test]
    fn test_labels() {
        let source = Arc::new(FakeSource::with(&[]));
        assert_eq!(LibraryStrategy::direct(source.clone()).label(), "direct-library");
        assert_eq!(LibraryStrategy::proxied(source).label(), "proxy-library");
    }
}
