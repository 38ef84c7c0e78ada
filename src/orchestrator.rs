/// Fallback orchestration across extraction strategies
///
/// Strategies run strictly one after another in priority order. Each one is
/// bounded by its own timeout; the first attempt that yields at least one
/// non-empty normalized segment wins and nothing after it runs.
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};

use crate::config::Config;
use crate::error::{ExtractionAttempt, ExtractionError, TranscriptError};
use crate::identifier::{self, VideoId};
use crate::segments::{self, Transcript, TranscriptSegment};
use crate::strategies::{self, TranscriptStrategy};

pub struct TranscriptExtractor {
    strategies: Vec<Box<dyn TranscriptStrategy>>,
}

impl TranscriptExtractor {
    pub fn new(strategies: Vec<Box<dyn TranscriptStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(strategies::from_config(config))
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Extract a transcript for any accepted identifier shape
    pub async fn extract(&self, raw: &str) -> Result<Transcript, TranscriptError> {
        self.extract_with_attempts(raw).await.map(|(transcript, _)| transcript)
    }

    /// Like `extract`, also returning the attempts made before success
    pub async fn extract_with_attempts(
        &self,
        raw: &str,
    ) -> Result<(Transcript, Vec<ExtractionAttempt>), TranscriptError> {
        let id = identifier::normalize(raw)?;
        let span = info_span!("extract", video_id = %id);
        self.run(id).instrument(span).await
    }

    async fn run(&self, id: VideoId) -> Result<(Transcript, Vec<ExtractionAttempt>), TranscriptError> {
        let mut attempts = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let started = Instant::now();
            let span = info_span!("strategy", name = strategy.name());
            let outcome = attempt(strategy.as_ref(), &id).instrument(span).await;
            let elapsed = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(segments) => {
                    info!(
                        "✅ {} produced {} segments in {}ms",
                        strategy.name(),
                        segments.len(),
                        elapsed
                    );
                    attempts.push(ExtractionAttempt::success(strategy.name(), elapsed));
                    let transcript = Transcript {
                        video_id: id,
                        strategy: strategy.name().to_string(),
                        segments,
                    };
                    return Ok((transcript, attempts));
                }
                Err(e) => {
                    warn!("❌ {} failed after {}ms: {}", strategy.name(), elapsed, e);
                    attempts.push(ExtractionAttempt::failure(strategy.name(), &e, elapsed));
                }
            }
        }

        let error = TranscriptError::TranscriptUnavailable {
            video_id: id.to_string(),
            attempts,
        };
        warn!("All strategies exhausted: {}", error.diagnostics());
        Err(error)
    }
}

/// One strategy run under its timeout, normalized
async fn attempt(strategy: &dyn TranscriptStrategy, id: &VideoId) -> crate::error::Result<Vec<TranscriptSegment>> {
    let budget = strategy.timeout();
    let raw = match tokio::time::timeout(budget, strategy.extract(id)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(ExtractionError::Timeout(format!(
                "{} exceeded its {:?} budget",
                strategy.name(),
                budget
            )))
        }
    };
    segments::normalize(raw)
}
