/// Failure artifacts for browser automation
///
/// On a failed browser attempt the page is captured as a screenshot and an
/// HTML snapshot, named `<video_id>-<step>-<UTC timestamp>.{png,html}`.
/// Capture is best-effort: problems are logged and never replace the
/// extraction error.
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::identifier::VideoId;
use crate::strategies::browser::BrowserSession;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File stem for one capture
    pub fn stem(&self, video_id: &VideoId, step: &str) -> String {
        let step: String = step
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!("{}-{}-{}", video_id, step, Utc::now().format("%Y%m%dT%H%M%S%.3fZ"))
    }

    /// Save a screenshot and the page HTML; returns the files written
    pub async fn capture(&self, session: &dyn BrowserSession, video_id: &VideoId, step: &str) -> Vec<PathBuf> {
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!("Cannot create artifacts directory {}: {}", self.dir.display(), e);
            return Vec::new();
        }

        let stem = self.stem(video_id, step);
        let mut written = Vec::new();

        match session.screenshot().await {
            Ok(png) => {
                let path = self.dir.join(format!("{}.png", stem));
                match tokio::fs::write(&path, png).await {
                    Ok(()) => written.push(path),
                    Err(e) => warn!("Failed to write screenshot {}: {}", path.display(), e),
                }
            }
            Err(e) => warn!("Screenshot capture failed: {}", e),
        }

        match session.content().await {
            Ok(html) => {
                let path = self.dir.join(format!("{}.html", stem));
                match tokio::fs::write(&path, html).await {
                    Ok(()) => written.push(path),
                    Err(e) => warn!("Failed to write HTML snapshot {}: {}", path.display(), e),
                }
            }
            Err(e) => warn!("HTML snapshot failed: {}", e),
        }

        if !written.is_empty() {
            info!("🗂️ Saved {} diagnostic artifacts for {} at step {}", written.len(), video_id, step);
        }
        written
    }
}
