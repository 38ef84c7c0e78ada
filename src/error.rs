use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classified failure of a single extraction strategy.
///
/// Every strategy converts its internal faults into one of these variants
/// before returning, so the orchestrator never sees an unclassified error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Captions not found: {0}")]
    NotFound(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Browser launch error: {0}")]
    BrowserLaunch(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("Strategy not configured: {0}")]
    NotConfigured(String),
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Parse(_) => ErrorKind::Parse,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Service(_) => ErrorKind::Service,
            Self::BrowserLaunch(_) => ErrorKind::BrowserLaunch,
            Self::ElementNotFound(_) => ErrorKind::ElementNotFound,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::EmptyResult(_) => ErrorKind::EmptyResult,
            Self::NotConfigured(_) => ErrorKind::NotConfigured,
        }
    }
}

impl From<reqwest::Error> for ExtractionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_decode() {
            Self::Parse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ExtractionError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<chromiumoxide::error::CdpError> for ExtractionError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        use chromiumoxide::error::CdpError;
        match e {
            CdpError::Timeout => Self::Timeout("browser operation timed out".to_string()),
            CdpError::NotFound => Self::ElementNotFound("node not found".to_string()),
            // launch failures are classified at the launch call site
            other => Self::ElementNotFound(other.to_string()),
        }
    }
}

/// Error kind recorded per extraction attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidIdentifier,
    Network,
    NotFound,
    Parse,
    Auth,
    Service,
    BrowserLaunch,
    ElementNotFound,
    Timeout,
    EmptyResult,
    NotConfigured,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidIdentifier => "InvalidIdentifier",
            Self::Network => "NetworkError",
            Self::NotFound => "NotFoundError",
            Self::Parse => "ParseError",
            Self::Auth => "AuthError",
            Self::Service => "ServiceError",
            Self::BrowserLaunch => "BrowserLaunchError",
            Self::ElementNotFound => "ElementNotFoundError",
            Self::Timeout => "TimeoutError",
            Self::EmptyResult => "EmptyResultError",
            Self::NotConfigured => "NotConfigured",
        };
        write!(f, "{}", name)
    }
}

/// One strategy's outcome, kept only to build the failure report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionAttempt {
    pub strategy_name: String,
    pub succeeded: bool,
    pub error: Option<ErrorKind>,
    /// Detail message of the failure, for operators
    pub message: Option<String>,
    pub duration_ms: u64,
}

impl ExtractionAttempt {
    pub fn success(strategy_name: &str, duration_ms: u64) -> Self {
        Self {
            strategy_name: strategy_name.to_string(),
            succeeded: true,
            error: None,
            message: None,
            duration_ms,
        }
    }

    pub fn failure(strategy_name: &str, error: &ExtractionError, duration_ms: u64) -> Self {
        Self {
            strategy_name: strategy_name.to_string(),
            succeeded: false,
            error: Some(error.kind()),
            message: Some(error.to_string()),
            duration_ms,
        }
    }
}

/// Error returned by the public extraction entry point
#[derive(Error, Debug, Clone)]
pub enum TranscriptError {
    #[error("Invalid video identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Transcript unavailable for this video")]
    TranscriptUnavailable {
        video_id: String,
        attempts: Vec<ExtractionAttempt>,
    },
}

impl TranscriptError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::InvalidIdentifier(_) => Some(ErrorKind::InvalidIdentifier),
            Self::TranscriptUnavailable { .. } => None,
        }
    }

    /// Per-strategy attempt records, empty for identifier failures
    pub fn attempts(&self) -> &[ExtractionAttempt] {
        match self {
            Self::InvalidIdentifier(_) => &[],
            Self::TranscriptUnavailable { attempts, .. } => attempts,
        }
    }

    /// Operator-facing summary of every attempt
    pub fn diagnostics(&self) -> String {
        match self {
            Self::InvalidIdentifier(raw) => format!("invalid identifier: {}", raw),
            Self::TranscriptUnavailable { video_id, attempts } => {
                let lines: Vec<String> = attempts
                    .iter()
                    .map(|a| {
                        format!(
                            "  - {} [{}] {}ms: {}",
                            a.strategy_name,
                            a.error.map(|k| k.to_string()).unwrap_or_else(|| "ok".to_string()),
                            a.duration_ms,
                            a.message.as_deref().unwrap_or("")
                        )
                    })
                    .collect();
                format!("{} attempt(s) for {}:\n{}", attempts.len(), video_id, lines.join("\n"))
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractionError>;
