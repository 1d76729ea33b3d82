use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use url::Url;

use super::AcquisitionStrategy;
use crate::captions::{CaptionTrack, is_captcha_page};
use crate::http::{DEFAULT_TIMEOUT, HttpFetch, HttpRequest};
use crate::language::select;
use crate::normalize::{RawCaptions, normalize};
use crate::{Failure, FailureKind, Transcript, TranscriptLine, VideoId};

const CAPTION_TRACKS_KEY: &str = "\"captionTracks\":";
const TIMEDTEXT_URL: &str = "https://www.youtube.com/api/timedtext";

pub struct PageScrapeStrategy {
    http: Arc<dyn HttpFetch>,
    proxy: Option<String>,
    timeout: Duration,
}

impl PageScrapeStrategy {
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self {
            http,
            proxy: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn get(&self, url: String, context: &str) -> Result<String, Failure> {
        let request = HttpRequest::get(url)
            .header("Accept-Language", "en-US,en;q=0.9")
            .proxy(self.proxy.as_deref())
            .timeout(self.timeout);
        Ok(self.http.send(request).await?.error_for_status(context)?.body)
    }

    async fn fetch_timedtext(&self, url: String) -> Result<Vec<TranscriptLine>, Failure> {
        let body = self.get(url, "timedtext").await?;
        if body.trim().is_empty() {
            return Err(Failure::NotFound("timedtext returned an empty body".to_string()));
        }
        parse_timedtext(body)
    }

    /// Public captions endpoint, used when the page embeds no track list
    async fn fetch_direct_endpoint(&self, video_id: &VideoId, language: &str) -> Result<Transcript, Failure> {
        let url = Url::parse_with_params(
            TIMEDTEXT_URL,
            &[("v", video_id.as_str()), ("lang", language), ("fmt", "json3")],
        )
        .map_err(|e| Failure::Upstream(format!("bad timedtext URL: {e}")))?;

        debug!("No captionTracks in page, trying timedtext endpoint for lang={language}");
        let lines = self.fetch_timedtext(url.into()).await?;
        Transcript::from_lines(video_id.clone(), language, lines)
    }
}

#[async_trait]
impl AcquisitionStrategy for PageScrapeStrategy {
    fn label(&self) -> &str {
        "page-scrape"
    }

    async fn attempt(&self, video_id: &VideoId, language: &str) -> Result<Transcript, Failure> {
        let html = self.get(video_id.watch_url(), "watch page").await?;

        if is_captcha_page(&html) {
            return Err(Failure::Blocked(format!("captcha served for video {video_id}")));
        }

        let tracks = match extract_caption_tracks(&html)? {
            Some(tracks) if !tracks.is_empty() => tracks,
            _ => return self.fetch_direct_endpoint(video_id, language).await,
        };
        debug!("Page embeds {} caption tracks", tracks.len());

        let track = select(language, &tracks)
            .ok_or_else(|| Failure::NotFound(format!("no caption tracks for video {video_id}")))?;
        debug!("page-scrape: using track lang={}", track.language_code);

        let lines = self.fetch_timedtext(json3_url(&track.base_url)).await?;
        Transcript::from_lines(video_id.clone(), track.language_code.clone(), lines)
    }
}

/// Ask for json3 unless the URL already names a format
fn json3_url(base_url: &str) -> String {
    if base_url.contains("fmt=") {
        base_url.to_string()
    } else if base_url.contains('?') {
        format!("{base_url}&fmt=json3")
    } else {
        format!("{base_url}?fmt=json3")
    }
}

/// JSON3 first; a body that is not JSON is retried as XML
fn parse_timedtext(body: String) -> Result<Vec<TranscriptLine>, Failure> {
    match normalize(RawCaptions::Json3(body.clone())) {
        Err(e) if e.kind() == FailureKind::Upstream => {
            debug!("timedtext body is not JSON ({e}), parsing as XML");
            normalize(RawCaptions::Xml(body))
        }
        other => other,
    }
}

/// Locate the `captionTracks` array in raw watch-page HTML.
///
/// Returns `Ok(None)` when the page embeds no track list at all.
fn extract_caption_tracks(html: &str) -> Result<Option<Vec<CaptionTrack>>, Failure> {
    let Some(pos) = html.find(CAPTION_TRACKS_KEY) else {
        return Ok(None);
    };
    let rest = &html[pos + CAPTION_TRACKS_KEY.len()..];
    let Some(array) = balanced_array(rest) else {
        return Ok(None);
    };

    let decoded = array.replace("\\u0026", "&");
    let tracks: Vec<CaptionTrack> = serde_json::from_str(&decoded)?;
    Ok(Some(tracks))
}

/// The leading `[...]` of `s`, honoring nesting and JSON strings
fn balanced_array(s: &str) -> Option<&str> {
    let s = s.trim_start();
    if !s.starts_with('[') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::fake::FakeFetch;

    const PAGE: &str = r#"<script>var ytInitialPlayerResponse = {"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://www.youtube.com/api/timedtext?v=dQw4w9WgXcQ&lang=en-US&name=x","name":{"runs":[{"text":"English [US]"}]},"languageCode":"en-US"},{"baseUrl":"https://www.youtube.com/api/timedtext?v=dQw4w9WgXcQ&lang=en&kind=asr","languageCode":"en","kind":"asr"},{"baseUrl":"https://www.youtube.com/api/timedtext?v=dQw4w9WgXcQ&lang=fr&fmt=srv1","languageCode":"fr"}],"audioTracks":[]}}};</script>"#;

    const JSON3: &str = r#"{"events":[{"tStartMs":1000,"dDurationMs":2000,"segs":[{"utf8":"Hello"},{"utf8":"there"}]}]}"#;

    const XML: &str = r#"<?xml version="1.0" encoding="utf-8" ?><transcript><text start="3.5" dur="1">Bonjour &amp;amp; salut</text></transcript>"#;

    fn vid() -> VideoId {
        VideoId::parse("dQw4w9WgXcQ").unwrap()
    }

    #[test]
    fn test_extract_caption_tracks() {
        let tracks = extract_caption_tracks(PAGE).unwrap().unwrap();
        assert_eq!(tracks.len(), 3);
        assert_eq!(
            tracks[0].base_url,
            "https://www.youtube.com/api/timedtext?v=dQw4w9WgXcQ&lang=en-US&name=x"
        );
        assert_eq!(tracks[1].kind.as_deref(), Some("asr"));
    }

    #[test]
    fn test_extract_caption_tracks_absent() {
        assert!(extract_caption_tracks("<html>nothing</html>").unwrap().is_none());
    }

    #[test]
    fn test_balanced_array_handles_brackets_in_strings() {
        let s = r#"[{"a":"]["},[1,2]] trailing]"#;
        assert_eq!(balanced_array(s), Some(r#"[{"a":"]["},[1,2]]"#));
        assert_eq!(balanced_array("[unterminated"), None);
        assert_eq!(balanced_array("{}"), None);
    }

    #[test]
    fn test_json3_url() {
        assert_eq!(json3_url("https://a/b?v=1"), "https://a/b?v=1&fmt=json3");
        assert_eq!(json3_url("https://a/b?v=1&fmt=srv3"), "https://a/b?v=1&fmt=srv3");
        assert_eq!(json3_url("https://a/b"), "https://a/b?fmt=json3");
    }

    #[tokio::test]
    async fn test_prefix_match_json3() {
        let fake = Arc::new(
            FakeFetch::new()
                .route("watch?v=", 200, PAGE)
                .route("lang=en-US", 200, JSON3),
        );
        let s = PageScrapeStrategy::new(fake.clone()).with_proxy(Some("http://proxy:1".to_string()));

        let t = s.attempt(&vid(), "en").await.unwrap();
        assert_eq!(t.language, "en-US");
        assert_eq!(t.full_text, "Hello there");
        assert_eq!(t.lines[0].start, 1.0);

        let urls = fake.urls();
        assert!(urls[1].ends_with("&fmt=json3"));
        assert!(fake.requests.lock().unwrap().iter().all(|r| r.proxy.is_some()));
    }

    #[tokio::test]
    async fn test_xml_only_captions() {
        let fake = Arc::new(FakeFetch::new().route("watch?v=", 200, PAGE).route("lang=fr", 200, XML));
        let s = PageScrapeStrategy::new(fake.clone());

        let t = s.attempt(&vid(), "fr").await.unwrap();
        assert_eq!(t.language, "fr");
        assert_eq!(t.lines.len(), 1);
        assert_eq!(t.lines[0].text, "Bonjour & salut");
        assert_eq!(t.lines[0].formatted_time, "0:03");
    }

    #[tokio::test]
    async fn test_no_track_list_uses_timedtext_endpoint() {
        let fake = Arc::new(
            FakeFetch::new()
                .route("watch?v=", 200, "<html>no captions here</html>")
                .route("api/timedtext", 200, JSON3),
        );
        let t = PageScrapeStrategy::new(fake.clone()).attempt(&vid(), "de").await.unwrap();
        assert_eq!(t.language, "de");

        let urls = fake.urls();
        assert_eq!(urls[1], "https://www.youtube.com/api/timedtext?v=dQw4w9WgXcQ&lang=de&fmt=json3");
    }

    #[tokio::test]
    async fn test_empty_timedtext_is_not_found() {
        let fake = Arc::new(
            FakeFetch::new()
                .route("watch?v=", 200, "<html></html>")
                .route("api/timedtext", 200, ""),
        );
        let err = PageScrapeStrategy::new(fake).attempt(&vid(), "en").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotFound);
    }

    #[tokio::test]
    async fn test_captcha_is_blocked() {
        let fake = Arc::new(FakeFetch::new().route("watch?v=", 200, r#"<form action="/sorry/index">"#));
        let err = PageScrapeStrategy::new(fake).attempt(&vid(), "en").await.unwrap_err();
        assert!(err.is_blocked());
    }

    #[tokio::test]
    async fn test_timeout_is_ordinary_failure() {
        let fake = Arc::new(FakeFetch::new().fail("watch?v=", Failure::Upstream("request timed out".to_string())));
        let err = PageScrapeStrategy::new(fake).attempt(&vid(), "en").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Upstream);
    }
}
