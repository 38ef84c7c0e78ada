/// Browser automation strategy
///
/// The most resilient and most expensive path: drives a headless browser
/// through the watch page's transcript panel. The browser process is owned
/// by a session that is closed on every exit path; if the strategy future
/// is dropped by the orchestrator's timeout, dropping the session kills
/// the process.

pub mod chrome;
pub mod probe;

pub use chrome::ChromeLauncher;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use self::probe::Probe;
use super::{StrategyName, TranscriptStrategy};
use crate::config::Config;
use crate::diagnostics::ArtifactStore;
use crate::error::{ExtractionError, Result};
use crate::identifier::VideoId;
use crate::segments::RawSegment;

const SEGMENT_POLLS: u32 = 10;
const SEGMENT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(2);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(3);
/// Reserved at the end of the budget for artifacts and shutdown
const SHUTDOWN_RESERVE: Duration = Duration::from_secs(5);

/// Text probed from one segment container
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RowText {
    pub timestamp: Option<String>,
    pub text: Option<String>,
    /// The container's own visible text
    pub raw: Option<String>,
}

/// An open browser with one page
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate, bounded by `timeout`
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Number of elements matching `selector`
    async fn count(&self, selector: &str) -> Result<usize>;

    /// Click the first match; `false` when nothing matches
    async fn click(&self, selector: &str) -> Result<bool>;

    /// Click the first visible button-like element whose text matches
    async fn click_by_text(&self, needles: &[&str]) -> Result<bool>;

    /// Focus the first match and press `key`; `false` when nothing matches
    async fn press_key(&self, selector: &str, key: &str) -> Result<bool>;

    /// Probe every `row_selector` match for timestamp and text sub-elements
    async fn read_rows(
        &self,
        row_selector: &str,
        timestamp_selectors: &[&str],
        text_selectors: &[&str],
    ) -> Result<Vec<RowText>>;

    /// Infer a segment selector from a panel headed "Transcript"
    async fn discover_segment_selector(&self) -> Result<Option<String>>;

    async fn screenshot(&self) -> Result<Vec<u8>>;

    async fn content(&self) -> Result<String>;

    /// Terminate the browser process; safe to call more than once
    async fn close(&mut self) -> Result<()>;
}

/// Starts browser sessions
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// Headless-browser transcript extraction
pub struct BrowserAutomationStrategy {
    launcher: Arc<dyn BrowserLauncher>,
    watch_base_url: String,
    timeout: Duration,
    navigation_timeout: Duration,
    artifacts: Option<ArtifactStore>,
}

impl BrowserAutomationStrategy {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        watch_base_url: String,
        timeout: Duration,
        navigation_timeout: Duration,
    ) -> Self {
        Self {
            launcher,
            watch_base_url,
            timeout,
            navigation_timeout,
            artifacts: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let launcher = Arc::new(ChromeLauncher::new(config.browser.clone(), config.http.user_agent.clone()));
        let strategy = Self::new(
            launcher,
            config.http.watch_base_url.clone(),
            config.timeouts.browser(),
            config.timeouts.navigation(),
        );
        match &config.browser.artifacts_dir {
            Some(dir) => strategy.with_artifacts(ArtifactStore::new(dir.clone())),
            None => strategy,
        }
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactStore) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Budget for launch plus the interaction steps, leaving room to shut down
    fn step_budget(&self) -> Duration {
        self.timeout
            .checked_sub(SHUTDOWN_RESERVE)
            .filter(|d| !d.is_zero())
            .unwrap_or(self.timeout / 2)
    }

    async fn run_steps(&self, session: &dyn BrowserSession, id: &VideoId) -> std::result::Result<Vec<RawSegment>, (ExtractionError, &'static str)> {
        let url = id.watch_url(&self.watch_base_url);
        info!("🌐 Opening watch page in browser: {}", url);
        session
            .navigate(&url, self.navigation_timeout)
            .await
            .map_err(|e| (e, "navigate"))?;

        // consent and description expansion are best-effort
        let consent = [Probe::Selectors(probe::CONSENT_SELECTORS), Probe::ButtonText(probe::CONSENT_TEXT)];
        if let Ok(Some(via)) = probe::click_first(session, &consent).await {
            debug!("Dismissed consent dialog via {}", via);
        }

        let expand = [
            Probe::Selectors(probe::EXPAND_DESCRIPTION_SELECTORS),
            Probe::ButtonText(probe::EXPAND_DESCRIPTION_TEXT),
        ];
        match probe::click_first(session, &expand).await {
            Ok(Some(via)) => debug!("Expanded description via {}", via),
            Ok(None) => debug!("Description expander not found"),
            Err(e) => debug!("Description expander probe failed: {}", e),
        }

        let open_transcript = [
            Probe::Selectors(probe::OPEN_TRANSCRIPT_SELECTORS),
            Probe::ButtonText(probe::OPEN_TRANSCRIPT_TEXT),
            Probe::Keyboard {
                focus: probe::MORE_ACTIONS_SELECTORS,
                key: "Enter",
                then_text: probe::MENU_TRANSCRIPT_TEXT,
            },
        ];
        match probe::click_first(session, &open_transcript).await {
            Ok(Some(via)) => info!("📜 Opened transcript panel via {}", via),
            Ok(None) => {
                return Err((
                    ExtractionError::ElementNotFound("transcript button not found".to_string()),
                    "open-transcript",
                ))
            }
            Err(e) => return Err((e, "open-transcript")),
        }

        let selector = probe::locate_segments(session, SEGMENT_POLLS, SEGMENT_POLL_INTERVAL)
            .await
            .map_err(|e| (e, "locate-segments"))?
            .ok_or_else(|| {
                (
                    ExtractionError::ElementNotFound("no transcript segment elements".to_string()),
                    "locate-segments",
                )
            })?;

        let rows = session
            .read_rows(&selector, probe::TIMESTAMP_SUBSELECTORS, probe::TEXT_SUBSELECTORS)
            .await
            .map_err(|e| (e, "read-segments"))?;
        let segments = probe::rows_to_segments(&rows);
        debug!("Read {} rows, {} with timestamps", rows.len(), segments.len());

        if segments.is_empty() {
            return Err((
                ExtractionError::ElementNotFound(format!(
                    "{} segment elements matched {} but none had a timestamp",
                    rows.len(),
                    selector
                )),
                "read-segments",
            ));
        }

        info!("✅ Read {} transcript segments from the page", segments.len());
        Ok(segments)
    }

    async fn automate(&self, id: &VideoId) -> Result<Vec<RawSegment>> {
        // one deadline covers launch and steps, so the reserve is never eaten
        let budget = self.step_budget();
        let deadline = Instant::now() + budget;

        let mut session = match tokio::time::timeout_at(deadline, self.launcher.launch()).await {
            Ok(session) => session?,
            Err(_) => {
                return Err(ExtractionError::Timeout(format!(
                    "browser launch exceeded {:?}",
                    budget
                )))
            }
        };

        let outcome = match tokio::time::timeout_at(deadline, self.run_steps(session.as_ref(), id)).await {
            Ok(outcome) => outcome,
            Err(_) => Err((
                ExtractionError::Timeout(format!("browser launch and steps exceeded {:?}", budget)),
                "timeout",
            )),
        };

        if let Err((error, step)) = &outcome {
            warn!("Browser automation failed at {}: {}", step, error);
            if let Some(artifacts) = &self.artifacts {
                let capture = artifacts.capture(session.as_ref(), id, step);
                if tokio::time::timeout(CAPTURE_TIMEOUT, capture).await.is_err() {
                    warn!("Diagnostic capture timed out");
                }
            }
        }

        match tokio::time::timeout(CLOSE_TIMEOUT, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Browser shutdown reported an error: {}", e),
            // dropping the session kills the process
            Err(_) => warn!("Browser shutdown timed out"),
        }

        outcome.map_err(|(error, _)| error)
    }
}

#[async_trait]
impl TranscriptStrategy for BrowserAutomationStrategy {
    fn name(&self) -> &str {
        StrategyName::BrowserAutomation.as_str()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn extract(&self, id: &VideoId) -> Result<Vec<RawSegment>> {
        self.automate(id).await
    }
}
