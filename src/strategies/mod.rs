/// Transcript extraction strategies
///
/// Each strategy is an independent way of obtaining raw caption data for a
/// video. They are composed by the orchestrator in a fixed priority order:
/// cheapest first, most resilient last.

pub mod browser;
pub mod direct;
pub mod remote;

pub use browser::BrowserAutomationStrategy;
pub use direct::DirectScrapeStrategy;
pub use remote::RemoteServiceStrategy;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::identifier::VideoId;
use crate::segments::RawSegment;

/// Strategy identifiers, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyName {
    DirectScrape,
    RemoteService,
    BrowserAutomation,
}

impl StrategyName {
    pub const ALL: [StrategyName; 3] = [
        StrategyName::DirectScrape,
        StrategyName::RemoteService,
        StrategyName::BrowserAutomation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectScrape => "direct_scrape",
            Self::RemoteService => "remote_service",
            Self::BrowserAutomation => "browser_automation",
        }
    }
}

impl fmt::Display for StrategyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StrategyName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "direct_scrape" | "direct" => Ok(Self::DirectScrape),
            "remote_service" | "remote" => Ok(Self::RemoteService),
            "browser_automation" | "browser" => Ok(Self::BrowserAutomation),
            other => Err(format!("unknown strategy: {}", other)),
        }
    }
}

/// One independently implemented method of obtaining raw transcript data
#[async_trait]
pub trait TranscriptStrategy: Send + Sync {
    /// Name of the strategy (for logging and attempt records)
    fn name(&self) -> &str;

    /// Upper bound the orchestrator grants this strategy
    fn timeout(&self) -> Duration;

    /// Extract raw segments; every failure is returned classified
    async fn extract(&self, id: &VideoId) -> Result<Vec<RawSegment>>;
}

/// Build the enabled strategies from configuration, in priority order
pub fn from_config(config: &Config) -> Vec<Box<dyn TranscriptStrategy>> {
    let mut strategies: Vec<Box<dyn TranscriptStrategy>> = Vec::new();

    for name in StrategyName::ALL {
        if !config.is_enabled(name) {
            tracing::debug!("Strategy {} disabled by configuration", name);
            continue;
        }

        match name {
            StrategyName::DirectScrape => {
                let fetcher = Arc::new(crate::http::HttpFetcher::new(
                    &config.http.user_agent,
                    config.timeouts.http_request(),
                ));
                strategies.push(Box::new(DirectScrapeStrategy::new(
                    fetcher,
                    config.http.clone(),
                    config.timeouts.direct_scrape(),
                )));
            }
            StrategyName::RemoteService => {
                strategies.push(Box::new(RemoteServiceStrategy::from_config(
                    &config.remote,
                    &config.http.watch_base_url,
                    config.timeouts.remote_service(),
                )));
            }
            StrategyName::BrowserAutomation => {
                strategies.push(Box::new(BrowserAutomationStrategy::from_config(config)));
            }
        }
    }

    strategies
}
