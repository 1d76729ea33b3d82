use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use url::Url;

use crate::Failure;
use crate::http::{HttpFetch, HttpRequest};

pub const DEFAULT_CHUNK_CHARS: usize = 4500;

const GOOGLE_TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";

/// Translation capability
#[async_trait]
pub trait Translate: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, Failure>;
}

/// Google Translate public `gtx` endpoint
pub struct GoogleTranslator {
    http: Arc<dyn HttpFetch>,
    timeout: Duration,
}

impl GoogleTranslator {
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self {
            http,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Translate for GoogleTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, Failure> {
        let url = Url::parse_with_params(
            GOOGLE_TRANSLATE_URL,
            &[("client", "gtx"), ("sl", source), ("tl", target), ("dt", "t"), ("q", text)],
        )
        .map_err(|e| Failure::Upstream(format!("bad translate URL: {e}")))?;

        let resp = self
            .http
            .send(HttpRequest::get(String::from(url)).timeout(self.timeout))
            .await?
            .error_for_status("translate")?;

        extract_translation(&resp.json()?)
    }
}

/// Concatenate the translated sentence parts of a `gtx` response
fn extract_translation(json: &serde_json::Value) -> Result<String, Failure> {
    let sentences = json
        .get(0)
        .and_then(|s| s.as_array())
        .ok_or_else(|| Failure::Upstream("unexpected translate response format".to_string()))?;

    Ok(sentences
        .iter()
        .filter_map(|s| s.get(0).and_then(|t| t.as_str()))
        .collect())
}

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Cuts at the last whitespace inside the window when there is one.
/// Concatenating the chunks yields `text` exactly.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let window_end = rest.char_indices().nth(max_chars).map(|(i, _)| i).unwrap_or(rest.len());
        if window_end == rest.len() {
            chunks.push(rest);
            break;
        }

        let cut = rest[..window_end]
            .char_indices()
            .filter(|(_, c)| c.is_whitespace())
            .map(|(i, c)| i + c.len_utf8())
            .last()
            .unwrap_or(window_end);

        chunks.push(&rest[..cut]);
        rest = &rest[cut..];
    }
    chunks
}

/// Translate chunk by chunk, keeping each chunk's surrounding whitespace.
///
/// Any failing chunk fails the whole call.
pub async fn translate_chunked(
    translator: &dyn Translate,
    text: &str,
    target: &str,
    max_chars: usize,
) -> Result<String, Failure> {
    let chunks = chunk_text(text, max_chars);
    debug!("Translating {} chars in {} chunks to {target}", text.chars().count(), chunks.len());

    let mut out = String::with_capacity(text.len());
    for chunk in chunks {
        let core = chunk.trim();
        let lead = &chunk[..chunk.len() - chunk.trim_start().len()];
        let trail = &chunk[chunk.trim_end().len()..];

        out.push_str(lead);
        if !core.is_empty() {
            out.push_str(&translator.translate(core, "auto", target).await?);
        }
        if !trail.is_empty() && !core.is_empty() {
            out.push_str(trail);
        }
    }
    Ok(out)
}
