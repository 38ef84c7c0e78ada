use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BrowserLauncher, BrowserSession, RowText};
use crate::config::BrowserSettings;
use crate::error::{ExtractionError, Result};

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(20);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);
/// Profile directories are named `yt-transcript-chrome-XXXXXX`
pub const PROFILE_PREFIX: &str = "yt-transcript-chrome-";

/// Elements a user would think of as buttons or menu entries
const CLICKABLE: &str = "button, tp-yt-paper-button, tp-yt-paper-item, ytd-button-renderer, \
    yt-button-shape, ytd-menu-service-item-renderer, [role='button'], [role='menuitem']";

/// Launches a local Chrome/Chromium through the DevTools protocol
pub struct ChromeLauncher {
    settings: BrowserSettings,
    user_agent: String,
}

impl ChromeLauncher {
    pub fn new(settings: BrowserSettings, user_agent: String) -> Self {
        Self { settings, user_agent }
    }

    /// Private profile directory, so concurrent launches never share a lock
    fn profile_dir(&self) -> Result<TempDir> {
        tempfile::Builder::new()
            .prefix(PROFILE_PREFIX)
            .tempdir()
            .map_err(|e| ExtractionError::BrowserLaunch(format!("cannot create browser profile: {}", e)))
    }

    fn browser_config(&self, profile: &Path) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile)
            .request_timeout(REQUEST_TIMEOUT)
            .launch_timeout(LAUNCH_TIMEOUT)
            .window_size(1280, 900)
            .arg(format!("--user-agent={}", self.user_agent))
            .args(self.settings.extra_args.iter().cloned());

        if !self.settings.headless {
            builder = builder.with_head();
        }
        if self.settings.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(executable) = &self.settings.executable {
            builder = builder.chrome_executable(executable);
        }

        builder.build().map_err(ExtractionError::BrowserLaunch)
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let profile = self.profile_dir()?;
        let config = self.browser_config(profile.path())?;
        info!("🚀 Launching headless browser");

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ExtractionError::BrowserLaunch(format!("failed to start browser: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.kill().await;
                handler.abort();
                return Err(ExtractionError::BrowserLaunch(format!("failed to open page: {}", e)));
            }
        };

        debug!("Browser ready, profile at {}", profile.path().display());
        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            profile: Some(profile),
            page,
            handler,
        }))
    }
}

/// One browser process with a single page
///
/// `Browser` kills its child process on drop, so a session dropped mid-step
/// by a timeout still leaves nothing running. The profile directory is
/// removed after the browser (field order is drop order).
pub struct ChromeSession {
    browser: Option<Browser>,
    profile: Option<TempDir>,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeSession {
    async fn evaluate<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T> {
        let result = self.page.evaluate(script).await?;
        Ok(result.into_value::<T>()?)
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ExtractionError::Network(format!("navigation failed: {}", e))),
            Err(_) => Err(ExtractionError::Timeout(format!("navigation exceeded {:?}", timeout))),
        }
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        match self.page.find_elements(selector).await {
            Ok(elements) => Ok(elements.len()),
            // absent nodes surface as protocol errors
            Err(_) => Ok(0),
        }
    }

    async fn click(&self, selector: &str) -> Result<bool> {
        let elements = match self.page.find_elements(selector).await {
            Ok(elements) => elements,
            Err(_) => return Ok(false),
        };
        let Some(element) = elements.into_iter().next() else {
            return Ok(false);
        };

        if element.click().await.is_ok() {
            return Ok(true);
        }
        // off-screen or covered elements reject synthetic mouse input
        debug!("Mouse click on {} failed, using DOM click", selector);
        Ok(element.call_js_fn("function() { this.click(); }", false).await.is_ok())
    }

    async fn click_by_text(&self, needles: &[&str]) -> Result<bool> {
        let needles = serde_json::to_string(needles)?;
        let script = format!(
            r#"(() => {{
                const needles = {needles};
                const candidates = Array.from(document.querySelectorAll("{CLICKABLE}"))
                    .filter(el => el.offsetParent !== null || el.getClientRects().length > 0);
                const label = el => (el.innerText || el.textContent || el.getAttribute('aria-label') || '')
                    .trim().toLowerCase();
                for (const needle of needles) {{
                    const wanted = needle.toLowerCase();
                    const hit = candidates.find(el => label(el) === wanted)
                        || candidates.find(el => label(el).includes(wanted));
                    if (hit) {{ hit.click(); return true; }}
                }}
                return false;
            }})()"#
        );
        self.evaluate(script).await
    }

    async fn press_key(&self, selector: &str, key: &str) -> Result<bool> {
        let elements = match self.page.find_elements(selector).await {
            Ok(elements) => elements,
            Err(_) => return Ok(false),
        };
        let Some(element) = elements.into_iter().next() else {
            return Ok(false);
        };

        element.focus().await?;
        element.press_key(key).await?;
        Ok(true)
    }

    async fn read_rows(
        &self,
        row_selector: &str,
        timestamp_selectors: &[&str],
        text_selectors: &[&str],
    ) -> Result<Vec<RowText>> {
        let script = format!(
            r#"(() => {{
                const rowSelector = {row};
                const tsSelectors = {ts};
                const textSelectors = {text};
                const firstText = (row, selectors) => {{
                    for (const s of selectors) {{
                        const el = row.querySelector(s);
                        if (el && el.textContent.trim()) return el.textContent.trim();
                    }}
                    return null;
                }};
                return Array.from(document.querySelectorAll(rowSelector)).map(row => ({{
                    timestamp: firstText(row, tsSelectors),
                    text: firstText(row, textSelectors),
                    raw: (row.innerText || row.textContent || '').trim() || null,
                }}));
            }})()"#,
            row = serde_json::to_string(row_selector)?,
            ts = serde_json::to_string(timestamp_selectors)?,
            text = serde_json::to_string(text_selectors)?,
        );
        self.evaluate(script).await
    }

    async fn discover_segment_selector(&self) -> Result<Option<String>> {
        // find a panel headed "Transcript", then the most repeated element
        // inside it whose tag or class names a segment; elements whose text
        // starts with a timestamp are the second choice
        let script = r#"(() => {
            const stamp = /^\s*\d{1,2}(:\d{2}){1,2}\b/;
            const headings = Array.from(document.querySelectorAll('h1, h2, h3, #title, yt-formatted-string, span'))
                .filter(el => (el.textContent || '').trim().toLowerCase() === 'transcript');
            const mostRepeated = counts => {
                let best = null, bestCount = 1;
                for (const [key, n] of counts) {
                    if (n > bestCount) { best = key; bestCount = n; }
                }
                return best;
            };
            for (const heading of headings) {
                let panel = heading;
                for (let i = 0; i < 8 && panel.parentElement; i++) {
                    panel = panel.parentElement;
                    if (panel.querySelectorAll('*').length > 20) break;
                }
                const named = new Map();
                const stamped = new Map();
                for (const el of panel.querySelectorAll('*')) {
                    const tag = el.tagName.toLowerCase();
                    const classes = typeof el.className === 'string' ? el.className.trim().split(/\s+/) : [];
                    const segmentClass = classes.find(c => c.toLowerCase().includes('segment'));
                    if (tag.includes('segment')) {
                        named.set(tag, (named.get(tag) || 0) + 1);
                    } else if (segmentClass) {
                        const key = tag + '.' + segmentClass;
                        named.set(key, (named.get(key) || 0) + 1);
                    } else if (el.children.length > 0 && stamp.test(el.innerText || '')) {
                        const key = tag + (classes[0] ? '.' + classes[0] : '');
                        stamped.set(key, (stamped.get(key) || 0) + 1);
                    }
                }
                const best = mostRepeated(named) || mostRepeated(stamped);
                if (best) return best;
            }
            return '';
        })()"#;
        // a bare null result carries no value over CDP, so "" means none
        let selector: String = self.evaluate(script.to_string()).await?;
        Ok(Some(selector).filter(|s| !s.is_empty()))
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder().full_page(true).build();
        Ok(self.page.screenshot(params).await?)
    }

    async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };

        let graceful = tokio::time::timeout(CLOSE_TIMEOUT, async {
            browser.close().await?;
            browser.wait().await.map_err(|e| ExtractionError::BrowserLaunch(e.to_string()))?;
            Ok::<_, ExtractionError>(())
        })
        .await;

        match graceful {
            Ok(Ok(())) => debug!("Browser closed"),
            Ok(Err(e)) => {
                warn!("Graceful browser close failed ({}), killing process", e);
                let _ = browser.kill().await;
            }
            Err(_) => {
                warn!("Browser did not exit within {:?}, killing process", CLOSE_TIMEOUT);
                let _ = browser.kill().await;
            }
        }

        self.handler.abort();
        if let Some(profile) = self.profile.take() {
            if let Err(e) = profile.close() {
                debug!("Browser profile cleanup failed: {}", e);
            }
        }
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrowserSettings;

    #[test]
    fn test_browser_config_from_settings() {
        let launcher = ChromeLauncher::new(BrowserSettings::default(), "TestAgent/1.0".to_string());
        let profile = launcher.profile_dir().unwrap();
        // fails only when no executable can be located on this machine
        match launcher.browser_config(profile.path()) {
            Ok(config) => drop(config),
            Err(e) => assert!(matches!(e, ExtractionError::BrowserLaunch(_))),
        }
    }

    #[test]
    fn test_each_launch_gets_its_own_profile() {
        let launcher = ChromeLauncher::new(BrowserSettings::default(), "TestAgent/1.0".to_string());
        let first = launcher.profile_dir().unwrap();
        let second = launcher.profile_dir().unwrap();

        assert_ne!(first.path(), second.path());
        for profile in [&first, &second] {
            let name = profile.path().file_name().unwrap().to_string_lossy().to_string();
            assert!(name.starts_with(PROFILE_PREFIX));
        }

        let path = first.path().to_path_buf();
        first.close().unwrap();
        assert!(!path.exists());
    }
}
