use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::captions::{CaptionSource, InnerTubeCaptions};
use crate::config::Config;
use crate::http::HttpFetch;
use crate::strategy::{AcquisitionStrategy, LibraryStrategy, PageScrapeStrategy, StrategyKind, SupadataStrategy};
use crate::{CaptionTrackDescriptor, Failure, FailureKind, Transcript, VideoId};

/// Outcome of one strategy invocation
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionAttempt {
    pub strategy: String,
    pub succeeded: bool,
    pub error: Option<Failure>,
}

/// Result of a full fallback run plus the attempt ledger
#[derive(Debug)]
pub struct Acquisition {
    pub outcome: Result<Transcript, Failure>,
    pub attempts: Vec<AcquisitionAttempt>,
}

pub struct FallbackOrchestrator {
    strategies: Vec<Arc<dyn AcquisitionStrategy>>,
    supadata: Option<Arc<SupadataStrategy>>,
    listing: Option<Arc<dyn CaptionSource>>,
    languages_timeout: Duration,
}

impl FallbackOrchestrator {
    /// Use `strategies` as given, in order
    pub fn new(strategies: Vec<Arc<dyn AcquisitionStrategy>>) -> Self {
        Self {
            strategies,
            supadata: None,
            listing: None,
            languages_timeout: Duration::from_secs(15),
        }
    }

    /// Build the active list from configuration, skipping strategies whose
    /// credentials or proxy are not configured
    pub fn from_config(config: &Config, http: Arc<dyn HttpFetch>) -> Self {
        let timeout = config.request_timeout();
        let proxy = config.resolved_proxy();

        let supadata = config.supadata_key().map(|key| {
            Arc::new(SupadataStrategy::new(http.clone(), key).with_timeout(config.supadata_timeout()))
        });

        let direct_source: Arc<dyn CaptionSource> = Arc::new(InnerTubeCaptions::new(http.clone()).with_timeout(timeout));
        let proxied_source: Option<Arc<dyn CaptionSource>> = proxy.clone().map(|p| {
            Arc::new(InnerTubeCaptions::new(http.clone()).with_proxy(Some(p)).with_timeout(timeout)) as Arc<dyn CaptionSource>
        });

        let mut strategies: Vec<Arc<dyn AcquisitionStrategy>> = Vec::new();
        for kind in config.strategy_order() {
            let strategy: Option<Arc<dyn AcquisitionStrategy>> = match kind {
                StrategyKind::Supadata => supadata.clone().map(|s| s as Arc<dyn AcquisitionStrategy>),
                StrategyKind::ProxyLibrary => proxied_source
                    .clone()
                    .map(|src| Arc::new(LibraryStrategy::proxied(src)) as Arc<dyn AcquisitionStrategy>),
                StrategyKind::PageScrape => Some(Arc::new(
                    PageScrapeStrategy::new(http.clone())
                        .with_proxy(proxy.clone())
                        .with_timeout(timeout),
                )),
                StrategyKind::DirectLibrary => Some(Arc::new(LibraryStrategy::direct(direct_source.clone()))),
            };
            match strategy {
                Some(s) => strategies.push(s),
                None => debug!("Strategy {kind} not configured, skipping"),
            }
        }

        Self {
            strategies,
            supadata,
            listing: Some(proxied_source.unwrap_or(direct_source)),
            languages_timeout: config.languages_timeout(),
        }
    }

    /// Labels of the active strategies, in attempt order
    pub fn labels(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.label().to_string()).collect()
    }

    /// Try each strategy in order until one succeeds
    pub async fn acquire(&self, video_id: &VideoId, language: &str) -> Acquisition {
        let mut attempts = Vec::with_capacity(self.strategies.len());

        if self.strategies.is_empty() {
            return Acquisition {
                outcome: Err(Failure::Configuration(
                    "no transcript strategies are configured".to_string(),
                )),
                attempts,
            };
        }

        for strategy in &self.strategies {
            info!("Trying {} for {video_id} (lang={language})", strategy.label());
            match strategy.attempt(video_id, language).await {
                Ok(transcript) => {
                    info!(
                        "{} succeeded: {} lines, {} words",
                        strategy.label(),
                        transcript.lines.len(),
                        transcript.word_count
                    );
                    attempts.push(AcquisitionAttempt {
                        strategy: strategy.label().to_string(),
                        succeeded: true,
                        error: None,
                    });
                    return Acquisition {
                        outcome: Ok(transcript),
                        attempts,
                    };
                }
                Err(e) => {
                    warn!("{} failed: {e}", strategy.label());
                    attempts.push(AcquisitionAttempt {
                        strategy: strategy.label().to_string(),
                        succeeded: false,
                        error: Some(e),
                    });
                }
            }
        }

        Acquisition {
            outcome: Err(terminal_failure(&attempts)),
            attempts,
        }
    }

    /// Best-effort listing of caption languages; empty on any failure
    pub async fn list_languages(&self, video_id: &VideoId) -> Vec<CaptionTrackDescriptor> {
        if let Some(ref supadata) = self.supadata {
            match supadata.available_languages(video_id, self.languages_timeout).await {
                Ok(langs) if !langs.is_empty() => return langs,
                Ok(_) => debug!("Supadata listed no languages for {video_id}"),
                Err(e) => warn!("get_languages via supadata failed: {e}"),
            }
        }

        if let Some(ref source) = self.listing {
            match source.list(video_id).await {
                Ok(tracks) => return tracks.iter().map(|t| t.descriptor()).collect(),
                Err(e) => warn!("get_languages failed: {e}"),
            }
        }

        Vec::new()
    }
}

/// Surface classification once every strategy has failed
fn terminal_failure(attempts: &[AcquisitionAttempt]) -> Failure {
    let errors: Vec<&Failure> = attempts.iter().filter_map(|a| a.error.as_ref()).collect();

    match errors.last() {
        Some(last) if last.is_blocked() => Failure::Blocked(format!(
            "YouTube is blocking transcript requests from this server ({})",
            last.message()
        )),
        Some(last) if errors.iter().all(|e| e.kind() == FailureKind::QuotaExceeded) => (*last).clone(),
        _ => Failure::NotFound("No transcript found. This video may not have captions.".to_string()),
    }
}
