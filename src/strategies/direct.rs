/// Direct page scraping: watch page -> caption-track manifest -> timed text
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{StrategyName, TranscriptStrategy};
use crate::config::HttpConfig;
use crate::error::{ExtractionError, Result};
use crate::http::PageFetcher;
use crate::identifier::VideoId;
use crate::segments::{decode_entities, RawSegment};

const MANIFEST_KEY: &str = "\"captionTracks\"";

lazy_static! {
    static ref TEXT_ELEMENT: Regex =
        Regex::new(r#"(?s)<text\b([^>]*?)(?:/>|>(.*?)</text>)"#).unwrap();
    static ref PARAGRAPH_ELEMENT: Regex =
        Regex::new(r#"(?s)<p\b([^>]*?)(?:/>|>(.*?)</p>)"#).unwrap();
    static ref START_ATTR: Regex = Regex::new(r#"\bstart\s*=\s*"([0-9.]+)""#).unwrap();
    static ref MS_START_ATTR: Regex = Regex::new(r#"\bt\s*=\s*"([0-9]+)""#).unwrap();
    static ref INNER_TAG: Regex = Regex::new(r"(?s)<[^>]+>").unwrap();
    static ref PLAYABILITY: Regex = Regex::new(
        r#""playabilityStatus"\s*:\s*\{\s*"status"\s*:\s*"([A-Z_]+)"(?:\s*,\s*"reason"\s*:\s*"((?:[^"\\]|\\.)*)")?"#
    )
    .unwrap();
}

/// One entry of the embedded caption-track manifest
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub language_code: String,
    /// `asr` for auto-generated tracks
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<serde_json::Value>,
}

impl CaptionTrack {
    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }

    fn has_url(&self) -> bool {
        self.base_url.as_deref().map_or(false, |u| !u.trim().is_empty())
    }

    fn matches_language(&self, preferred: &str) -> bool {
        let code = self.language_code.to_lowercase();
        let preferred = preferred.to_lowercase();
        code == preferred || code.starts_with(&format!("{}-", preferred))
    }
}

/// Scrapes captions from the public watch page
pub struct DirectScrapeStrategy {
    fetcher: Arc<dyn PageFetcher>,
    http: HttpConfig,
    timeout: Duration,
}

impl DirectScrapeStrategy {
    pub fn new(fetcher: Arc<dyn PageFetcher>, http: HttpConfig, timeout: Duration) -> Self {
        Self {
            fetcher,
            http,
            timeout,
        }
    }

    async fn scrape(&self, id: &VideoId) -> Result<Vec<RawSegment>> {
        let watch_url = id.watch_url(&self.http.watch_base_url);
        info!("📄 Fetching watch page: {}", watch_url);
        let html = self.fetcher.get_text(&watch_url).await?;

        let tracks = parse_caption_manifest(&html)?;
        debug!("Found {} caption track(s)", tracks.len());

        let track = select_track(&tracks, &self.http.preferred_languages).ok_or_else(|| {
            ExtractionError::NotFound(format!("no fetchable caption track for {}", id))
        })?;
        info!(
            "🎯 Selected caption track: {}{}",
            track.language_code,
            if track.is_generated() { " (auto-generated)" } else { "" }
        );

        let track_url = resolve_track_url(track, &self.http.watch_base_url)?;
        let xml = self.fetcher.get_text(&track_url).await?;
        let segments = parse_timed_text(&xml)?;

        info!("✅ Extracted {} timed-text elements", segments.len());
        Ok(segments)
    }
}

#[async_trait]
impl TranscriptStrategy for DirectScrapeStrategy {
    fn name(&self) -> &str {
        StrategyName::DirectScrape.as_str()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn extract(&self, id: &VideoId) -> Result<Vec<RawSegment>> {
        self.scrape(id).await
    }
}

/// Locate and decode the caption-track manifest embedded in the watch page.
///
/// A page without the manifest key means the video has no captions
/// (`NotFound`); a key whose array cannot be isolated or decoded is a
/// `Parse` failure.
pub fn parse_caption_manifest(html: &str) -> Result<Vec<CaptionTrack>> {
    let source = manifest_source(html);

    let key_pos = match source.find(MANIFEST_KEY) {
        Some(pos) => pos,
        None => {
            if let Some(reason) = unplayable_reason(html) {
                return Err(ExtractionError::NotFound(format!("video not playable: {}", reason)));
            }
            return Err(ExtractionError::NotFound("page has no caption tracks".to_string()));
        }
    };

    let after_key = &source[key_pos + MANIFEST_KEY.len()..];
    let array = isolate_json_array(after_key).ok_or_else(|| {
        ExtractionError::Parse("caption manifest array could not be isolated".to_string())
    })?;

    let tracks: Vec<CaptionTrack> = serde_json::from_str(array)
        .map_err(|e| ExtractionError::Parse(format!("caption manifest is not valid JSON: {}", e)))?;

    if tracks.is_empty() {
        return Err(ExtractionError::NotFound("caption manifest is empty".to_string()));
    }

    Ok(tracks)
}

/// Prefer the inline script carrying the manifest; fall back to the raw page
fn manifest_source(html: &str) -> std::borrow::Cow<'_, str> {
    let document = Html::parse_document(html);
    if let Ok(selector) = Selector::parse("script") {
        for script in document.select(&selector) {
            let body: String = script.text().collect();
            if body.contains(MANIFEST_KEY) {
                return std::borrow::Cow::Owned(body);
            }
        }
    }
    std::borrow::Cow::Borrowed(html)
}

fn unplayable_reason(html: &str) -> Option<String> {
    let captures = PLAYABILITY.captures(html)?;
    let status = captures.get(1)?.as_str();
    if status == "OK" {
        return None;
    }
    let reason = captures
        .get(2)
        .map(|m| m.as_str().replace("\\\"", "\""))
        .unwrap_or_else(|| status.to_string());
    Some(reason)
}

/// Bracket-match the JSON array following a `"key":` position
fn isolate_json_array(text: &str) -> Option<&str> {
    let trimmed = text.trim_start();
    let after_colon = trimmed.strip_prefix(':')?.trim_start();
    if !after_colon.starts_with('[') {
        return None;
    }
    let offset = text.len() - after_colon.len();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in after_colon.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[offset..offset + i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Pick a track: preferred languages in order (human-authored before
/// auto-generated at each level), else the first track with a URL
pub fn select_track<'a>(tracks: &'a [CaptionTrack], preferred: &[String]) -> Option<&'a CaptionTrack> {
    for language in preferred {
        let matching: Vec<&CaptionTrack> = tracks
            .iter()
            .filter(|t| t.has_url() && t.matches_language(language))
            .collect();
        if let Some(track) = matching.iter().find(|t| !t.is_generated()).or_else(|| matching.first()) {
            return Some(*track);
        }
    }

    tracks.iter().find(|t| t.has_url())
}

fn resolve_track_url(track: &CaptionTrack, base_url: &str) -> Result<String> {
    let raw = track
        .base_url
        .as_deref()
        .ok_or_else(|| ExtractionError::NotFound("caption track has no URL".to_string()))?;

    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(base_url)
                .map_err(|e| ExtractionError::Parse(format!("invalid base URL {}: {}", base_url, e)))?;
            base.join(raw)
                .map_err(|e| ExtractionError::Parse(format!("invalid caption URL {}: {}", raw, e)))?
        }
        Err(e) => {
            return Err(ExtractionError::Parse(format!("invalid caption URL {}: {}", raw, e)));
        }
    };

    Ok(url.to_string())
}

/// Tolerant timed-text parser.
///
/// Reads `<text start=".." dur="..">` elements (seconds); documents in the
/// newer `<p t=".." d="..">` layout (milliseconds) are read as a fallback.
pub fn parse_timed_text(xml: &str) -> Result<Vec<RawSegment>> {
    let mut segments: Vec<RawSegment> = TEXT_ELEMENT
        .captures_iter(xml)
        .filter_map(|caps| {
            let attrs = caps.get(1)?.as_str();
            let start = START_ATTR.captures(attrs)?.get(1)?.as_str().parse::<f64>().ok()?;
            let payload = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            Some(RawSegment::new(start, decode_entities(payload)))
        })
        .collect();

    if segments.is_empty() {
        segments = PARAGRAPH_ELEMENT
            .captures_iter(xml)
            .filter_map(|caps| {
                let attrs = caps.get(1)?.as_str();
                let start_ms = MS_START_ATTR.captures(attrs)?.get(1)?.as_str().parse::<u64>().ok()?;
                let payload = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                let stripped = INNER_TAG.replace_all(payload, "");
                Some(RawSegment::new(start_ms as f64 / 1000.0, decode_entities(&stripped)))
            })
            .collect();
    }

    if segments.is_empty() {
        warn!("Timed-text document had no text elements ({} bytes)", xml.len());
        return Err(ExtractionError::Parse("no text elements in timed-text document".to_string()));
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watch_page(manifest: &str) -> String {
        format!(
            r#"<html><head><title>Me at the zoo</title></head><body>
            <script>var ytInitialPlayerResponse = {{"playabilityStatus":{{"status":"OK"}},"captions":{{"playerCaptionsTracklistRenderer":{{"captionTracks":{},"audioTracks":[]}}}}}};</script>
            </body></html>"#,
            manifest
        )
    }

    fn track(lang: &str, kind: Option<&str>, url: Option<&str>) -> CaptionTrack {
        CaptionTrack {
            base_url: url.map(str::to_string),
            language_code: lang.to_string(),
            kind: kind.map(str::to_string),
            name: None,
        }
    }

    #[test]
    fn test_manifest_extraction() {
        let html = watch_page(
            r#"[{"baseUrl":"https://www.youtube.com/api/timedtext?v=jNQXAC9IVRw&lang=en","name":{"simpleText":"English [x]"},"languageCode":"en"},{"baseUrl":"https://www.youtube.com/api/timedtext?lang=de","languageCode":"de","kind":"asr"}]"#,
        );

        let tracks = parse_caption_manifest(&html).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(
            tracks[0].base_url.as_deref(),
            Some("https://www.youtube.com/api/timedtext?v=jNQXAC9IVRw&lang=en")
        );
        assert!(tracks[1].is_generated());
    }

    #[test]
    fn test_manifest_with_brackets_inside_strings() {
        let html = watch_page(r#"[{"baseUrl":"/api/timedtext?x=]","name":{"simpleText":"English [auto] \"quoted\""},"languageCode":"en"}]"#);
        let tracks = parse_caption_manifest(&html).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].base_url.as_deref(), Some("/api/timedtext?x=]"));
    }

    #[test]
    fn test_missing_manifest_is_not_found() {
        let html = "<html><script>var ytInitialPlayerResponse = {\"playabilityStatus\":{\"status\":\"OK\"}};</script></html>";
        assert!(matches!(parse_caption_manifest(html), Err(ExtractionError::NotFound(_))));
    }

    #[test]
    fn test_unplayable_video_reports_reason() {
        let html = r#"<script>var ytInitialPlayerResponse = {"playabilityStatus":{"status":"ERROR","reason":"Video unavailable"}};</script>"#;
        match parse_caption_manifest(html) {
            Err(ExtractionError::NotFound(msg)) => assert!(msg.contains("Video unavailable")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_truncated_manifest_is_parse_error() {
        let html = r#"<script>{"captionTracks":[{"baseUrl":"https://x","languageCode":"en"</script>"#;
        assert!(matches!(parse_caption_manifest(html), Err(ExtractionError::Parse(_))));

        let html = r#"<script>{"captionTracks":{"oops":1}}</script>"#;
        assert!(matches!(parse_caption_manifest(html), Err(ExtractionError::Parse(_))));

        let html = r#"<script>{"captionTracks":[{"baseUrl":1,}]}</script>"#;
        assert!(matches!(parse_caption_manifest(html), Err(ExtractionError::Parse(_))));
    }

    #[test]
    fn test_empty_manifest_is_not_found() {
        let html = watch_page("[]");
        assert!(matches!(parse_caption_manifest(&html), Err(ExtractionError::NotFound(_))));
    }

    #[test]
    fn test_track_selection() {
        let en = vec!["en".to_string()];
        let tracks = vec![
            track("de", None, Some("https://x/de")),
            track("en", Some("asr"), Some("https://x/en-asr")),
            track("en-GB", None, Some("https://x/en-gb")),
        ];
        assert_eq!(select_track(&tracks, &en).unwrap().language_code, "en-GB");

        let tracks = vec![track("de", None, Some("https://x/de")), track("en", Some("asr"), Some("https://x/en"))];
        assert_eq!(select_track(&tracks, &en).unwrap().language_code, "en");

        let tracks = vec![track("fr", None, None), track("de", None, Some("https://x/de"))];
        assert_eq!(select_track(&tracks, &en).unwrap().language_code, "de");

        let tracks = vec![track("en", None, None), track("de", None, Some("  "))];
        assert!(select_track(&tracks, &en).is_none());

        // prefix match stops at the region separator
        let tracks = vec![track("enm", None, Some("https://x/enm")), track("en", Some("asr"), Some("https://x/en"))];
        assert_eq!(select_track(&tracks, &en).unwrap().language_code, "en");
    }

    #[test]
    fn test_relative_track_url_is_resolved() {
        let t = track("en", None, Some("/api/timedtext?v=abc&lang=en"));
        assert_eq!(
            resolve_track_url(&t, "https://www.youtube.com").unwrap(),
            "https://www.youtube.com/api/timedtext?v=abc&lang=en"
        );
    }

    #[test]
    fn test_timed_text_parsing() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><transcript>
            <text start="0" dur="3.2">All right, so here we are</text>
            <text start="3.2" dur="4.8">in front of the &amp;#39;elephants&amp;#39;</text>
            <text start="8.0" dur="1.0"/>
            <text dur="1" start="9.5">the cool thing
about these guys</text>
        </transcript>"#;

        let segments = parse_timed_text(xml).unwrap();
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0], RawSegment::new(0.0, "All right, so here we are"));
        assert_eq!(segments[1].start, 3.2);
        assert_eq!(segments[1].text, "in front of the &#39;elephants&#39;");
        assert_eq!(segments[2].text, "");
        assert_eq!(segments[3].start, 9.5);
    }

    #[test]
    fn test_timed_text_paragraph_format() {
        let xml = r#"<timedtext format="3"><body><p t="1500" d="2000"><s>Hello</s><s t="500"> there</s></p><p t="4000" d="900">again &amp; again</p></body></timedtext>"#;
        let segments = parse_timed_text(xml).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], RawSegment::new(1.5, "Hello there"));
        assert_eq!(segments[1], RawSegment::new(4.0, "again & again"));
    }

    #[test]
    fn test_timed_text_keeps_tag_like_cues() {
        let xml = r#"<transcript><text start="1" dur="2">&lt;music&gt; rock &amp; roll</text><text start="3" dur="1">if x &lt;y &amp;amp; z</text></transcript>"#;
        let segments = parse_timed_text(xml).unwrap();
        assert_eq!(segments[0], RawSegment::new(1.0, "<music> rock & roll"));
        assert_eq!(segments[1], RawSegment::new(3.0, "if x <y &amp; z"));
    }

    #[test]
    fn test_timed_text_without_elements_is_parse_error() {
        assert!(matches!(
            parse_timed_text("<transcript></transcript>"),
            Err(ExtractionError::Parse(_))
        ));
        assert!(matches!(parse_timed_text(""), Err(ExtractionError::Parse(_))));
    }
}
