/// Canonical transcript segments and the shared normalizer
///
/// Every strategy produces `RawSegment`s; `normalize` turns them into the
/// sorted, entity-decoded `TranscriptSegment`s handed back to callers.
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{ExtractionError, Result};
use crate::identifier::VideoId;

/// Strategy-specific caption unit, not yet normalized
#[derive(Debug, Clone, PartialEq)]
pub struct RawSegment {
    /// Offset from video start in seconds
    pub start: f64,
    pub text: String,
}

impl RawSegment {
    pub fn new(start: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            text: text.into(),
        }
    }
}

/// One spoken/captioned unit, as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    pub text: String,
    pub start_seconds: f64,
    /// `M:SS` or `H:MM:SS` rendering of `start_seconds`
    pub start_label: String,
}

impl TranscriptSegment {
    pub fn new(start_seconds: f64, text: String) -> Self {
        Self {
            text,
            start_seconds,
            start_label: format_timestamp(start_seconds),
        }
    }
}

impl fmt::Display for TranscriptSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.start_label, self.text)
    }
}

/// Successful extraction result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub video_id: VideoId,
    /// Name of the strategy that produced the segments
    pub strategy: String,
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// One `[label] text` line per segment
    pub fn to_plain_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Render seconds as `M:SS` below one hour, `H:MM:SS` at or above
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Parse `MM:SS` or `HH:MM:SS` (fractional seconds allowed) into seconds
pub fn parse_timestamp(raw: &str) -> Option<f64> {
    let parts: Vec<&str> = raw.trim().split(':').map(str::trim).collect();
    if parts.len() < 2 || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }

    let (hours, minutes, seconds) = match parts.as_slice() {
        [m, s] => (0u64, m.parse::<u64>().ok()?, s.parse::<f64>().ok()?),
        [h, m, s] => (h.parse::<u64>().ok()?, m.parse::<u64>().ok()?, s.parse::<f64>().ok()?),
        _ => return None,
    };

    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }

    let whole = hours.checked_mul(3600)?.checked_add(minutes.checked_mul(60)?)?;
    Some(whole as f64 + seconds)
}

/// Decode HTML entities (`&amp;`, `&#39;`, ...) in caption text.
/// Only entities are touched; tag-like text such as `<music>` is kept.
pub fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

fn clean_text(text: &str) -> String {
    decode_entities(text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Validate, decode and sort raw segments into canonical form
pub fn normalize(raw: Vec<RawSegment>) -> Result<Vec<TranscriptSegment>> {
    if raw.is_empty() {
        return Err(ExtractionError::EmptyResult("no segments extracted".to_string()));
    }

    let total = raw.len();
    let mut segments: Vec<TranscriptSegment> = raw
        .into_iter()
        .filter(|s| s.start.is_finite())
        .map(|s| TranscriptSegment::new(s.start.max(0.0), clean_text(&s.text)))
        .filter(|s| !s.text.is_empty())
        .collect();

    if segments.is_empty() {
        return Err(ExtractionError::EmptyResult(format!(
            "all {} segments had empty text",
            total
        )));
    }

    // stable: ties keep source order
    segments.sort_by(|a, b| {
        a.start_seconds
            .partial_cmp(&b.start_seconds)
            .unwrap_or(Ordering::Equal)
    });

    tracing::debug!("Normalized {} of {} raw segments", segments.len(), total);
    Ok(segments)
}
