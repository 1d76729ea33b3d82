/// English codes probed literally after the requested one; `a.en` is the ASR track id
pub const ENGLISH_VARIANTS: &[&str] = &["en", "en-US", "en-GB", "en-IN", "a.en"];

/// Anything that can be chosen as a caption track
pub trait TrackChoice {
    fn code(&self) -> &str;
    fn is_generated(&self) -> bool;
}

/// Requested language followed by English variants, deduplicated in order
pub fn probe_languages(requested: &str) -> Vec<String> {
    let requested = requested.trim();
    let mut probes: Vec<String> = Vec::with_capacity(ENGLISH_VARIANTS.len() + 1);
    for code in std::iter::once(requested).chain(ENGLISH_VARIANTS.iter().copied()) {
        if !code.is_empty() && !probes.iter().any(|p| p == code) {
            probes.push(code.to_string());
        }
    }
    probes
}

/// Pick the best track for `requested`.
///
/// Precedence: exact or prefix match (list order), any English code, first
/// manual track, first track.
pub fn select<'a, T: TrackChoice>(requested: &str, tracks: &'a [T]) -> Option<&'a T> {
    let requested = requested.trim();

    if !requested.is_empty() {
        if let Some(t) = tracks.iter().find(|t| t.code().starts_with(requested)) {
            return Some(t);
        }
    }

    tracks
        .iter()
        .find(|t| t.code().contains("en"))
        .or_else(|| tracks.iter().find(|t| !t.is_generated()))
        .or_else(|| tracks.first())
}

/// Walk `probes` for a literal code hit, then fall back to `select` on the first probe
pub fn select_with_probes<'a, T: TrackChoice>(probes: &[String], tracks: &'a [T]) -> Option<&'a T> {
    probes
        .iter()
        .find_map(|code| {
            let mut hits = tracks.iter().filter(|t| t.code() == code);
            let first = hits.next()?;
            // Prefer a manual track when both variants share a code
            Some(
                std::iter::once(first)
                    .chain(hits)
                    .find(|t| !t.is_generated())
                    .unwrap_or(first),
            )
        })
        .or_else(|| select(probes.first().map(String::as_str).unwrap_or_default(), tracks))
}
