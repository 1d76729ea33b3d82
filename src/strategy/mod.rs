pub mod library;
pub mod scrape;
pub mod supadata;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Failure, Transcript, VideoId};

pub use library::LibraryStrategy;
pub use scrape::PageScrapeStrategy;
pub use supadata::SupadataStrategy;

/// The acquisition methods, in default priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    Supadata,
    ProxyLibrary,
    PageScrape,
    DirectLibrary,
}

impl StrategyKind {
    pub const DEFAULT_ORDER: [StrategyKind; 4] = [
        StrategyKind::Supadata,
        StrategyKind::ProxyLibrary,
        StrategyKind::PageScrape,
        StrategyKind::DirectLibrary,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::Supadata => "supadata",
            StrategyKind::ProxyLibrary => "proxy-library",
            StrategyKind::PageScrape => "page-scrape",
            StrategyKind::DirectLibrary => "direct-library",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One self-contained way of obtaining a transcript.
///
/// Implementations never let a raw error escape: every network or parse
/// problem comes back as a classified `Failure`.
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    fn label(&self) -> &str;

    async fn attempt(&self, video_id: &VideoId, language: &str) -> Result<Transcript, Failure>;
}
