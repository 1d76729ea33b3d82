use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use regex::Regex;
use serde::Deserialize;
use url::Url;

use crate::http::{DEFAULT_TIMEOUT, HttpFetch, HttpRequest};
use crate::language::{TrackChoice, select_with_probes};
use crate::normalize::{CaptionCue, xml_cues};
use crate::{CaptionTrackDescriptor, Failure, VideoId};

const INNERTUBE_CLIENT_NAME: &str = "ANDROID";
const INNERTUBE_CLIENT_VERSION: &str = "20.10.38";

static API_KEY_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#).unwrap(),
        Regex::new(r#"innertubeApiKey\s*[=:]\s*"([^"]+)""#).unwrap(),
    ]
});

#[derive(Debug, Deserialize)]
struct InnerTubePlayerResponse {
    #[serde(rename = "playabilityStatus")]
    playability_status: Option<PlayabilityStatus>,
    captions: Option<CaptionsData>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CaptionsData {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
struct CaptionTracklistRenderer {
    #[serde(rename = "captionTracks")]
    caption_tracks: Option<Vec<CaptionTrack>>,
}

/// Caption track entry as embedded in player responses and watch pages
#[derive(Debug, Clone, Deserialize)]
pub struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    #[serde(rename = "languageCode")]
    pub language_code: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<TrackName>,
}

/// InnerTube text node: either `simpleText` or a list of `runs`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackName {
    #[serde(rename = "simpleText", default)]
    simple_text: Option<String>,
    #[serde(default)]
    runs: Vec<TextRun>,
}

#[derive(Debug, Clone, Deserialize)]
struct TextRun {
    #[serde(default)]
    text: String,
}

impl TrackName {
    fn text(&self) -> Option<String> {
        self.simple_text.clone().or_else(|| {
            let joined = self.runs.iter().map(|r| r.text.as_str()).collect::<String>();
            (!joined.is_empty()).then_some(joined)
        })
    }
}

impl CaptionTrack {
    pub fn descriptor(&self) -> CaptionTrackDescriptor {
        CaptionTrackDescriptor::new(
            self.language_code.clone(),
            self.name.as_ref().and_then(TrackName::text),
            self.is_generated(),
        )
    }
}

impl TrackChoice for CaptionTrack {
    fn code(&self) -> &str {
        &self.language_code
    }

    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// Caption-fetching capability: list the tracks of a video, fetch one track
#[async_trait]
pub trait CaptionSource: Send + Sync {
    async fn list(&self, video_id: &VideoId) -> Result<Vec<CaptionTrack>, Failure>;

    async fn fetch_track(&self, track: &CaptionTrack) -> Result<Vec<CaptionCue>, Failure>;

    /// One `list` call, then the first literal hit in `languages` order,
    /// falling back to selector precedence on the first language
    async fn fetch(&self, video_id: &VideoId, languages: &[String]) -> Result<(CaptionTrack, Vec<CaptionCue>), Failure> {
        let tracks = self.list(video_id).await?;
        let track = select_with_probes(languages, &tracks)
            .ok_or_else(|| Failure::NotFound(format!("no caption tracks for video {video_id}")))?;
        let cues = self.fetch_track(track).await?;
        Ok((track.clone(), cues))
    }
}

/// Watch page → API key → player endpoint → caption XML
pub struct InnerTubeCaptions {
    http: Arc<dyn HttpFetch>,
    proxy: Option<String>,
    timeout: Duration,
}

impl InnerTubeCaptions {
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

    fn request(&self, request: HttpRequest) -> HttpRequest {
        request.proxy(self.proxy.as_deref()).timeout(self.timeout)
    }
}

#[async_trait]
impl CaptionSource for InnerTubeCaptions {
    async fn list(&self, video_id: &VideoId) -> Result<Vec<CaptionTrack>, Failure> {
        // Step 1: Fetch the watch page to get the InnerTube API key
        let watch_url = video_id.watch_url();
        debug!("Fetching watch page: {watch_url}");

        let page = self
            .http
            .send(self.request(HttpRequest::get(&watch_url).header("Accept-Language", "en-US")))
            .await?
            .error_for_status("watch page")?;

        if is_captcha_page(&page.body) {
            return Err(Failure::Blocked(format!(
                "YouTube served a captcha for video {video_id}; requests from this IP are blocked"
            )));
        }

        let api_key = extract_api_key(&page.body)?;
        debug!("Extracted InnerTube API key");

        // Step 2: Call InnerTube player endpoint
        let player_url = format!("https://www.youtube.com/youtubei/v1/player?key={api_key}&prettyPrint=false");
        let body = serde_json::json!({
            "context": {
                "client": {
                    "clientName": INNERTUBE_CLIENT_NAME,
                    "clientVersion": INNERTUBE_CLIENT_VERSION
                }
            },
            "videoId": video_id.as_str()
        });

        let resp: InnerTubePlayerResponse = self
            .http
            .send(self.request(HttpRequest::post_json(player_url, body).header("Content-Type", "application/json")))
            .await?
            .error_for_status("player endpoint")?
            .json()?;

        check_playability(video_id, resp.playability_status.as_ref())?;

        let tracks = resp
            .captions
            .and_then(|c| c.player_captions_tracklist_renderer)
            .and_then(|r| r.caption_tracks)
            .unwrap_or_default();

        if tracks.is_empty() {
            return Err(Failure::NotFound(format!("no captions available for video {video_id}")));
        }
        debug!("Found {} caption tracks", tracks.len());
        Ok(tracks)
    }

    async fn fetch_track(&self, track: &CaptionTrack) -> Result<Vec<CaptionCue>, Failure> {
        // Step 3: Fetch the caption XML
        let url = without_format(&track.base_url);
        let resp = self
            .http
            .send(self.request(HttpRequest::get(url)))
            .await?
            .error_for_status("caption track")?;

        if resp.body.trim().is_empty() {
            return Err(Failure::NotFound(format!(
                "empty caption body for language {}",
                track.language_code
            )));
        }
        xml_cues(&resp.body)
    }
}

/// Drop any `fmt` query pair so the endpoint serves its default XML
fn without_format(base_url: &str) -> String {
    let Ok(mut url) = Url::parse(base_url) else {
        return base_url.to_string();
    };
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "fmt")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
    url.into()
}

pub(crate) fn is_captcha_page(html: &str) -> bool {
    html.contains("class=\"g-recaptcha\"") || html.contains("/sorry/index")
}

fn extract_api_key(html: &str) -> Result<String, Failure> {
    API_KEY_PATTERNS
        .iter()
        .find_map(|re| re.captures(html).map(|caps| caps[1].to_string()))
        .ok_or_else(|| Failure::Upstream("could not extract InnerTube API key from watch page".to_string()))
}

fn check_playability(video_id: &VideoId, status: Option<&PlayabilityStatus>) -> Result<(), Failure> {
    let Some(status) = status else {
        return Ok(());
    };
    let reason = status.reason.clone().unwrap_or_default();

    match status.status.as_deref() {
        None | Some("OK") => Ok(()),
        Some("LOGIN_REQUIRED") if reason.contains("bot") => {
            Err(Failure::Blocked(format!("{video_id}: {reason}")))
        }
        Some("LOGIN_REQUIRED") => Err(Failure::NotFound(format!("{video_id} is private or age restricted: {reason}"))),
        Some(other) => Err(Failure::NotFound(format!("{video_id} is unavailable ({other}): {reason}"))),
    }
}
