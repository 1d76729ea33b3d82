use std::sync::LazyLock;

use log::debug;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use serde::Deserialize;

use crate::{Failure, TranscriptLine, format_time, round2};

static EMBEDDED_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// A timed caption cue in seconds, before text cleanup.
///
/// This is also the record shape returned by the caption-fetching capability.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionCue {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

/// Item of the third-party transcript API `content` array (milliseconds)
#[derive(Debug, Clone, Deserialize)]
pub struct ThirdPartyItem {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub offset: f64,
    #[serde(default)]
    pub duration: f64,
}

#[derive(Debug, Deserialize)]
struct Json3Document {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    #[serde(rename = "tStartMs", default)]
    t_start_ms: f64,
    #[serde(rename = "dDurationMs", default)]
    d_duration_ms: f64,
    #[serde(default)]
    segs: Vec<Json3Segment>,
}

#[derive(Debug, Deserialize)]
struct Json3Segment {
    #[serde(default)]
    utf8: String,
}

/// Raw caption payload in one of the supported shapes
#[derive(Debug, Clone)]
pub enum RawCaptions {
    /// timedtext `fmt=json3` body
    Json3(String),
    /// timedtext XML body (`<text start dur>` or srv3 `<p t d>`)
    Xml(String),
    /// third-party API content list, offsets in milliseconds
    ThirdParty(Vec<ThirdPartyItem>),
    /// caption-library records, already in seconds
    Native(Vec<CaptionCue>),
}

impl RawCaptions {
    fn label(&self) -> &'static str {
        match self {
            RawCaptions::Json3(_) => "json3",
            RawCaptions::Xml(_) => "xml",
            RawCaptions::ThirdParty(_) => "third-party",
            RawCaptions::Native(_) => "native",
        }
    }

    /// Decode into cues without cleanup
    pub fn into_cues(self) -> Result<Vec<CaptionCue>, Failure> {
        match self {
            RawCaptions::Json3(body) => json3_cues(&body),
            RawCaptions::Xml(body) => xml_cues(&body),
            RawCaptions::ThirdParty(items) => Ok(items
                .into_iter()
                .map(|i| CaptionCue {
                    text: i.text,
                    start: i.offset / 1000.0,
                    duration: i.duration / 1000.0,
                })
                .collect()),
            RawCaptions::Native(cues) => Ok(cues),
        }
    }
}

/// Normalize a raw payload into canonical lines.
///
/// A payload that parses but yields no non-empty lines is a `NotFound` failure.
pub fn normalize(raw: RawCaptions) -> Result<Vec<TranscriptLine>, Failure> {
    let label = raw.label();
    let lines = canonicalize(raw.into_cues()?);
    debug!("Normalized {} {label} lines", lines.len());

    if lines.is_empty() {
        return Err(Failure::NotFound(format!("{label} captions contained no text")));
    }
    Ok(lines)
}

/// Clean text, drop empty cues, round timings and attach display times
pub fn canonicalize(cues: Vec<CaptionCue>) -> Vec<TranscriptLine> {
    cues.into_iter()
        .filter_map(|cue| {
            let text = clean_text(&cue.text);
            if text.is_empty() {
                return None;
            }
            let start = round2(cue.start);
            Some(TranscriptLine {
                text,
                start,
                duration: round2(cue.duration),
                formatted_time: format_time(start),
            })
        })
        .collect()
}

/// Decode HTML entities, drop embedded tags and collapse whitespace
pub fn clean_text(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    let stripped = EMBEDDED_TAG.replace_all(&decoded, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn json3_cues(body: &str) -> Result<Vec<CaptionCue>, Failure> {
    let doc: Json3Document = serde_json::from_str(body)?;

    Ok(doc
        .events
        .into_iter()
        .map(|event| {
            let text = event
                .segs
                .iter()
                .map(|s| s.utf8.as_str())
                .filter(|s| !s.is_empty() && *s != "\n")
                .collect::<Vec<_>>()
                .join(" ");
            CaptionCue {
                text,
                start: event.t_start_ms / 1000.0,
                duration: event.d_duration_ms / 1000.0,
            }
        })
        .collect())
}

/// Timing attributes of an open cue element, converted to seconds
fn cue_timing(e: &BytesStart<'_>) -> Option<(f64, f64)> {
    let (start_key, dur_key, scale): (&[u8], &[u8], f64) = match e.name().as_ref() {
        b"text" => (&b"start"[..], &b"dur"[..], 1.0),
        b"p" => (&b"t"[..], &b"d"[..], 1000.0),
        _ => return None,
    };

    let mut start = None;
    let mut dur = 0.0;
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).parse::<f64>().ok();
        if attr.key.as_ref() == start_key {
            start = value;
        } else if attr.key.as_ref() == dur_key {
            dur = value.unwrap_or(0.0);
        }
    }
    start.map(|s| (s / scale, dur / scale))
}

/// Parse timedtext XML into cues
pub fn xml_cues(xml: &str) -> Result<Vec<CaptionCue>, Failure> {
    let mut reader = Reader::from_str(xml);
    let mut cues = Vec::new();
    let mut current: Option<(f64, f64, String)> = None;
    let mut depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if current.is_some() {
                    // Nested formatting element inside a cue
                    depth += 1;
                } else if let Some((start, dur)) = cue_timing(e) {
                    current = Some((start, dur, String::new()));
                    depth = 0;
                }
            }
            Ok(Event::End(_)) => {
                if depth > 0 {
                    depth -= 1;
                } else if let Some((start, duration, text)) = current.take() {
                    cues.push(CaptionCue { text, start, duration });
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some((_, _, ref mut text)) = current {
                    let chunk = e
                        .unescape()
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(e).into_owned());
                    text.push_str(&chunk);
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Some((_, _, ref mut text)) = current {
                    text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Failure::Upstream(format!("error parsing caption XML: {e}"))),
            _ => {}
        }
    }

    Ok(cues)
}
