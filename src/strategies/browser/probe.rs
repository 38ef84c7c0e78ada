/// Ranked capability probes for the transcript UI
///
/// The watch page UI is versionless and drifts; every interaction is an
/// ordered list of detection methods tried with short-circuit evaluation:
/// known selectors, then visible button text, then keyboard or structural
/// fallbacks.
use std::time::Duration;
use tracing::{debug, info};

use super::{BrowserSession, RowText};
use crate::error::Result;
use crate::segments::{parse_timestamp, RawSegment};

/// Cookie/consent interstitial, seen in some regions
pub const CONSENT_SELECTORS: &[&str] = &[
    "button[aria-label^='Accept all']",
    "ytd-consent-bump-v2-lightbox button[aria-label^='Accept']",
    "form[action*='consent'] button",
];
pub const CONSENT_TEXT: &[&str] = &["Accept all", "I agree"];

/// Truncated description expander, newest layout first
pub const EXPAND_DESCRIPTION_SELECTORS: &[&str] = &[
    "ytd-text-inline-expander tp-yt-paper-button#expand",
    "#description-inline-expander #expand",
    "tp-yt-paper-button#expand",
    "#description #expand",
    "ytd-video-secondary-info-renderer #more",
    "#more",
];
pub const EXPAND_DESCRIPTION_TEXT: &[&str] = &["...more", "…more", "Show more"];

/// "Show transcript" affordance
pub const OPEN_TRANSCRIPT_SELECTORS: &[&str] = &[
    "ytd-video-description-transcript-section-renderer button",
    "ytd-video-description-transcript-section-renderer ytd-button-renderer",
    "button[aria-label='Show transcript']",
    "ytd-button-renderer[aria-label='Show transcript']",
    "tp-yt-paper-item[aria-label='Open transcript']",
    "ytd-menu-service-item-renderer[aria-label*='transcript' i]",
];
pub const OPEN_TRANSCRIPT_TEXT: &[&str] = &["Show transcript", "Open transcript", "Transcript"];

/// Keyboard fallback: focus the overflow menu, open it, then pick the entry
pub const MORE_ACTIONS_SELECTORS: &[&str] = &[
    "ytd-menu-renderer yt-button-shape#button-shape button",
    "button[aria-label='More actions']",
    "ytd-menu-renderer #button",
];
pub const MENU_TRANSCRIPT_TEXT: &[&str] = &["Show transcript", "Open transcript"];

/// Transcript segment containers
pub const SEGMENT_SELECTORS: &[&str] = &[
    "ytd-transcript-segment-renderer",
    "#segments-container ytd-transcript-segment-renderer",
    "ytd-transcript-segment-list-renderer .segment",
    "ytd-transcript-body-renderer .cue-group",
    "transcript-segment-view-model",
];

pub const TIMESTAMP_SUBSELECTORS: &[&str] = &[
    ".segment-timestamp",
    "div.segment-timestamp",
    "#timestamp",
    ".cue-group-start-offset",
    "[class*='timestamp']",
];

pub const TEXT_SUBSELECTORS: &[&str] = &[
    ".segment-text",
    "yt-formatted-string.segment-text",
    "#text",
    ".cue",
    "[class*='text']",
];

/// One detection method of a ranked probe
#[derive(Debug, Clone, Copy)]
pub enum Probe<'a> {
    /// Click the first element matching any selector, in order
    Selectors(&'a [&'a str]),
    /// Click the first visible button whose text matches, in order
    ButtonText(&'a [&'a str]),
    /// Focus an element, press a key, then pick a menu entry by text
    Keyboard {
        focus: &'a [&'a str],
        key: &'a str,
        then_text: &'a [&'a str],
    },
}

impl Probe<'_> {
    fn label(&self) -> &'static str {
        match self {
            Probe::Selectors(_) => "selector",
            Probe::ButtonText(_) => "button text",
            Probe::Keyboard { .. } => "keyboard",
        }
    }
}

/// Run probes in rank order; returns the kind of the probe that succeeded
pub async fn click_first(session: &dyn BrowserSession, probes: &[Probe<'_>]) -> Result<Option<&'static str>> {
    for probe in probes {
        let hit = match probe {
            Probe::Selectors(selectors) => click_selector(session, selectors).await?,
            Probe::ButtonText(needles) => session.click_by_text(needles).await?,
            Probe::Keyboard { focus, key, then_text } => {
                let mut opened = false;
                for selector in focus.iter() {
                    if session.press_key(selector, key).await? {
                        opened = true;
                        break;
                    }
                }
                if opened {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    session.click_by_text(then_text).await?
                } else {
                    false
                }
            }
        };

        if hit {
            debug!("Probe matched via {}", probe.label());
            return Ok(Some(probe.label()));
        }
    }
    Ok(None)
}

async fn click_selector(session: &dyn BrowserSession, selectors: &[&str]) -> Result<bool> {
    for selector in selectors {
        if session.click(selector).await? {
            debug!("Clicked {}", selector);
            return Ok(true);
        }
    }
    Ok(false)
}

/// Poll the known segment selectors, then fall back to structural discovery
pub async fn locate_segments(
    session: &dyn BrowserSession,
    polls: u32,
    interval: Duration,
) -> Result<Option<String>> {
    for poll in 0..polls.max(1) {
        for selector in SEGMENT_SELECTORS {
            if session.count(selector).await? > 0 {
                debug!("Segment selector {} matched on poll {}", selector, poll + 1);
                return Ok(Some(selector.to_string()));
            }
        }
        if poll + 1 < polls {
            tokio::time::sleep(interval).await;
        }
    }

    // best-effort: may match unrelated elements
    let discovered = session.discover_segment_selector().await?;
    if let Some(selector) = &discovered {
        info!("🧭 Discovered segment selector heuristically: {}", selector);
    }
    Ok(discovered)
}

/// Convert probed rows to raw segments; rows without a parseable
/// timestamp are skipped
pub fn rows_to_segments(rows: &[RowText]) -> Vec<RawSegment> {
    rows.iter().filter_map(row_to_segment).collect()
}

fn row_to_segment(row: &RowText) -> Option<RawSegment> {
    if let Some(start) = row.timestamp.as_deref().and_then(parse_timestamp) {
        let text = match row.text.as_deref() {
            Some(text) => text.to_string(),
            None => strip_leading_timestamp(row.raw.as_deref().unwrap_or("")),
        };
        return Some(RawSegment::new(start, text));
    }

    // no sub-elements matched: "0:05\nsome text" in the row's own text
    let raw = row.raw.as_deref()?.trim();
    let (first, rest) = raw.split_once(char::is_whitespace)?;
    let start = parse_timestamp(first)?;
    Some(RawSegment::new(start, rest.trim()))
}

fn strip_leading_timestamp(raw: &str) -> String {
    let raw = raw.trim();
    match raw.split_once(char::is_whitespace) {
        Some((first, rest)) if parse_timestamp(first).is_some() => rest.trim().to_string(),
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(ts: Option<&str>, text: Option<&str>, raw: Option<&str>) -> RowText {
        RowText {
            timestamp: ts.map(str::to_string),
            text: text.map(str::to_string),
            raw: raw.map(str::to_string),
        }
    }

    #[test]
    fn test_rows_to_segments() {
        let rows = vec![
            row(Some("0:00"), Some("All right"), None),
            row(Some("1:05"), None, Some("1:05\nso here we are")),
            row(None, None, Some("1:02:03 late line")),
            row(Some("n/a"), Some("no time"), Some("garbage")),
            row(None, None, None),
        ];

        let segments = rows_to_segments(&rows);
        assert_eq!(
            segments,
            vec![
                RawSegment::new(0.0, "All right"),
                RawSegment::new(65.0, "so here we are"),
                RawSegment::new(3723.0, "late line"),
            ]
        );
    }

    #[test]
    fn test_oversized_row_timestamps_are_skipped() {
        let rows = vec![
            row(None, None, Some("18446744073709551615:00:00 hi")),
            row(Some("18446744073709551615:00"), Some("too late"), None),
            row(Some("0:02"), Some("kept"), None),
        ];
        assert_eq!(rows_to_segments(&rows), vec![RawSegment::new(2.0, "kept")]);
    }

    #[test]
    fn test_candidate_lists_are_ordered_and_unique() {
        for list in [
            SEGMENT_SELECTORS,
            OPEN_TRANSCRIPT_SELECTORS,
            EXPAND_DESCRIPTION_SELECTORS,
            TIMESTAMP_SUBSELECTORS,
            TEXT_SUBSELECTORS,
        ] {
            let mut seen = std::collections::HashSet::new();
            assert!(list.iter().all(|s| seen.insert(*s)));
        }
        assert_eq!(SEGMENT_SELECTORS[0], "ytd-transcript-segment-renderer");
        // a bare "more" would also hit the "More actions" overflow button
        assert!(EXPAND_DESCRIPTION_TEXT
            .iter()
            .all(|needle| !"more actions".contains(&needle.to_lowercase())));
    }
}
