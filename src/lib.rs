/// YouTube Transcript Extractor - Rust Implementation
///
/// Resilient transcript retrieval for online videos. Three independent
/// strategies (page scraping, a managed extraction service and headless
/// browser automation) are tried in order behind a single entry point that
/// always returns normalized, time-ordered segments or one user-facing error.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod http;
pub mod identifier;
pub mod orchestrator;
pub mod segments;
pub mod strategies;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder, ExtractOptions, RemoteCredentials, TimeoutConfig};
pub use crate::error::{ErrorKind, ExtractionAttempt, ExtractionError, TranscriptError};
pub use crate::identifier::VideoId;
pub use crate::orchestrator::TranscriptExtractor;
pub use crate::segments::{Transcript, TranscriptSegment};
pub use crate::strategies::{StrategyName, TranscriptStrategy};

/// Extract the transcript of a video from a URL or bare identifier
///
/// Configuration comes from `Config::load()`; `options` override timeouts
/// and remote-service credentials for this call only.
pub async fn extract_transcript(
    video_url_or_id: &str,
    options: ExtractOptions,
) -> Result<Vec<TranscriptSegment>, TranscriptError> {
    let loaded = Config::load()
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        })
        .with_options(options);
    let config = effective_config(loaded);

    TranscriptExtractor::from_config(&config)
        .extract(video_url_or_id)
        .await
        .map(|transcript| transcript.segments)
}

/// Repair a configuration that fails validation
///
/// Invalid timeouts are replaced by the defaults first. If the result is
/// still invalid, only the remote service settings are kept.
fn effective_config(config: Config) -> Config {
    let Err(e) = config.validate() else {
        return config;
    };
    tracing::warn!("Configuration problem ({}), using default timeouts", e);

    let mut repaired = config;
    repaired.timeouts = TimeoutConfig::default();
    if let Err(e) = repaired.validate() {
        tracing::warn!("Configuration still invalid ({}), using defaults", e);
        return Config {
            remote: repaired.remote,
            ..Config::default()
        };
    }
    repaired
}
