/// Video identifier normalization
///
/// Accepts a bare 11-character identifier or any of the known URL shapes
/// (watch, embed, short-link, shorts) and resolves it to a `VideoId`.
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TranscriptError;

lazy_static! {
    static ref BARE_ID: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap();

    /// Known URL shapes, tried in order; first match wins
    static ref URL_SHAPES: Vec<(&'static str, Regex)> = vec![
        (
            "watch",
            Regex::new(r"(?:youtube\.com|youtube-nocookie\.com)/watch\?(?:[^#]*&)?v=([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)").unwrap(),
        ),
        (
            "embed",
            Regex::new(r"(?:youtube\.com|youtube-nocookie\.com)/(?:embed|v|live)/([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)").unwrap(),
        ),
        (
            "short-link",
            Regex::new(r"youtu\.be/([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)").unwrap(),
        ),
        (
            "shorts",
            Regex::new(r"youtube\.com/shorts/([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)").unwrap(),
        ),
    ];
}

/// Canonical 11-character platform video identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Public watch page URL under the given base
    pub fn watch_url(&self, base_url: &str) -> String {
        format!("{}/watch?v={}", base_url.trim_end_matches('/'), self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for VideoId {
    type Err = TranscriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s)
    }
}

/// Resolve a raw URL or identifier to a canonical `VideoId`
pub fn normalize(raw: &str) -> Result<VideoId, TranscriptError> {
    let input = raw.trim();

    if BARE_ID.is_match(input) {
        return Ok(VideoId(input.to_string()));
    }

    for (shape, pattern) in URL_SHAPES.iter() {
        if let Some(id) = pattern.captures(input).and_then(|c| c.get(1)) {
            tracing::debug!("Matched {} URL shape for {}", shape, input);
            return Ok(VideoId(id.as_str().to_string()));
        }
    }

    Err(TranscriptError::InvalidIdentifier(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "jNQXAC9IVRw";

    #[test]
    fn test_supported_shapes_resolve_to_same_id() {
        let inputs = [
            "jNQXAC9IVRw",
            "  jNQXAC9IVRw\n",
            "https://www.youtube.com/watch?v=jNQXAC9IVRw",
            "https://youtube.com/watch?feature=share&v=jNQXAC9IVRw&t=42s",
            "http://m.youtube.com/watch?v=jNQXAC9IVRw#comments",
            "https://www.youtube.com/embed/jNQXAC9IVRw?autoplay=1",
            "https://www.youtube-nocookie.com/embed/jNQXAC9IVRw",
            "https://youtu.be/jNQXAC9IVRw",
            "https://youtu.be/jNQXAC9IVRw?si=abcdef",
            "https://www.youtube.com/shorts/jNQXAC9IVRw",
            "youtube.com/shorts/jNQXAC9IVRw?feature=share",
        ];

        for input in inputs {
            let id = normalize(input).unwrap_or_else(|_| panic!("failed for {}", input));
            assert_eq!(id.as_str(), ID, "input: {}", input);
        }
    }

    #[test]
    fn test_rejects_unsupported_input() {
        let inputs = [
            "",
            "jNQXAC9IVR",
            "jNQXAC9IVRwX",
            "jNQXAC9IV!w",
            "https://vimeo.com/123456789",
            "https://www.youtube.com/playlist?list=PLrAXtmRdnEQy",
            "https://www.youtube.com/watch?v=short",
            "https://youtu.be/jNQXAC9IVRwExtra",
        ];

        for input in inputs {
            assert!(
                matches!(normalize(input), Err(TranscriptError::InvalidIdentifier(_))),
                "accepted: {}",
                input
            );
        }
    }

    #[test]
    fn test_watch_url() {
        let id = normalize(ID).unwrap();
        assert_eq!(
            id.watch_url("https://www.youtube.com/"),
            "https://www.youtube.com/watch?v=jNQXAC9IVRw"
        );
    }
}
