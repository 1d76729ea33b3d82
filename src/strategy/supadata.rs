use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use url::Url;

use super::AcquisitionStrategy;
use crate::http::{HttpFetch, HttpRequest};
use crate::normalize::{RawCaptions, ThirdPartyItem, normalize};
use crate::{CaptionTrackDescriptor, Failure, Transcript, VideoId};

const SUPADATA_BASE_URL: &str = "https://api.supadata.ai";

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    #[serde(default)]
    content: serde_json::Value,
    #[serde(default)]
    lang: Option<String>,
    #[serde(rename = "availableLangs", default)]
    available_langs: Vec<String>,
}

pub struct SupadataStrategy {
    http: Arc<dyn HttpFetch>,
    api_key: String,
    timeout: Duration,
}

impl SupadataStrategy {
    pub fn new(http: Arc<dyn HttpFetch>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, video_id: &VideoId, language: Option<&str>) -> Result<String, Failure> {
        let base = format!("{SUPADATA_BASE_URL}/v1/transcript");
        let watch_url = video_id.watch_url();
        let mut params = vec![("url", watch_url.as_str())];
        if let Some(lang) = language {
            params.push(("lang", lang));
        }
        Url::parse_with_params(&base, &params)
            .map(String::from)
            .map_err(|e| Failure::Configuration(format!("invalid Supadata URL: {e}")))
    }

    async fn call(&self, video_id: &VideoId, language: Option<&str>, timeout: Duration) -> Result<TranscriptResponse, Failure> {
        let request = HttpRequest::get(self.endpoint(video_id, language)?)
            .header("x-api-key", &self.api_key)
            .timeout(timeout);

        let resp = self.http.send(request).await?;
        debug!("Supadata status: {}", resp.status);

        match resp.status {
            200 => resp.json(),
            404 => Err(Failure::NotFound(
                "No transcript found. This video may not have captions.".to_string(),
            )),
            402 => Err(Failure::QuotaExceeded(
                "Supadata free quota exceeded. Please upgrade at supadata.ai".to_string(),
            )),
            403 | 429 => Err(Failure::from_status(resp.status, "Supadata")),
            status => Err(Failure::Upstream(format!("Transcript service error: {status}"))),
        }
    }

    /// Languages the API reports for a video; `name` mirrors the code
    pub async fn available_languages(
        &self,
        video_id: &VideoId,
        timeout: Duration,
    ) -> Result<Vec<CaptionTrackDescriptor>, Failure> {
        let resp = self.call(video_id, None, timeout).await?;
        Ok(resp
            .available_langs
            .into_iter()
            .map(|code| CaptionTrackDescriptor::new(code, None, false))
            .collect())
    }
}

#[async_trait]
impl AcquisitionStrategy for SupadataStrategy {
    fn label(&self) -> &str {
        "supadata"
    }

    async fn attempt(&self, video_id: &VideoId, language: &str) -> Result<Transcript, Failure> {
        debug!("Calling Supadata for: {video_id}");
        let resp = self.call(video_id, Some(language), self.timeout).await?;

        let items: Vec<ThirdPartyItem> = match resp.content {
            serde_json::Value::Array(_) => serde_json::from_value(resp.content)?,
            _ => Vec::new(),
        };
        if items.is_empty() {
            return Err(Failure::NotFound("No transcript content returned.".to_string()));
        }

        let lines = normalize(RawCaptions::ThirdParty(items))?;
        let lang = resp.lang.filter(|l| !l.is_empty()).unwrap_or_else(|| language.to_string());
        Transcript::from_lines(video_id.clone(), lang, lines)
    }
}
