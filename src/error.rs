use thiserror::Error;

/// Classified failure of a transcript acquisition step.
///
/// Every strategy converts its network and parse errors into one of these
/// before returning, so the orchestrator only ever sees classified failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("blocked: {0}")]
    Blocked(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Failure classification without the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidInput,
    NotFound,
    QuotaExceeded,
    Blocked,
    Upstream,
    Configuration,
}

const BLOCKED_MARKERS: &[&str] = &[
    "blocked",
    "403",
    "too many requests",
    "429",
    "cloud",
    "not a bot",
    "captcha",
];

const QUOTA_MARKERS: &[&str] = &["quota", "402", "payment required"];

const NOT_FOUND_MARKERS: &[&str] = &[
    "not found",
    "404",
    "no transcript",
    "no captions",
    "disabled",
    "unavailable",
    "private",
];

impl Failure {
    /// Classify a free-form upstream error message by its markers.
    ///
    /// Blocking markers win over quota markers, which win over not-found markers.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if BLOCKED_MARKERS.iter().any(|m| lower.contains(m)) {
            Failure::Blocked(message)
        } else if QUOTA_MARKERS.iter().any(|m| lower.contains(m)) {
            Failure::QuotaExceeded(message)
        } else if NOT_FOUND_MARKERS.iter().any(|m| lower.contains(m)) {
            Failure::NotFound(message)
        } else {
            Failure::Upstream(message)
        }
    }

    /// Classify a non-success HTTP status from YouTube or a proxy
    pub fn from_status(status: u16, context: &str) -> Self {
        let message = format!("{context} returned HTTP {status}");
        match status {
            403 | 429 => Failure::Blocked(message),
            402 => Failure::QuotaExceeded(message),
            404 | 410 => Failure::NotFound(message),
            _ => Failure::Upstream(message),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Failure::InvalidInput(_) => FailureKind::InvalidInput,
            Failure::NotFound(_) => FailureKind::NotFound,
            Failure::QuotaExceeded(_) => FailureKind::QuotaExceeded,
            Failure::Blocked(_) => FailureKind::Blocked,
            Failure::Upstream(_) => FailureKind::Upstream,
            Failure::Configuration(_) => FailureKind::Configuration,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Failure::InvalidInput(m)
            | Failure::NotFound(m)
            | Failure::QuotaExceeded(m)
            | Failure::Blocked(m)
            | Failure::Upstream(m)
            | Failure::Configuration(m) => m,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.kind() == FailureKind::Blocked
    }
}

/// Request URLs carry video ids, so they are dropped before classifying
impl From<reqwest::Error> for Failure {
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_timeout() {
            return Failure::Upstream(format!("request timed out: {e}"));
        }
        if let Some(status) = e.status() {
            return Failure::from_status(status.as_u16(), "upstream");
        }
        if e.is_connect() || e.is_request() || e.is_builder() {
            return Failure::Upstream(format!("transport error: {e}"));
        }
        Failure::classify(e.to_string())
    }
}

impl From<serde_json::Error> for Failure {
    fn from(e: serde_json::Error) -> Self {
        Failure::Upstream(format!("malformed JSON: {e}"))
    }
}
