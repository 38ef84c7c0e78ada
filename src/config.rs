use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::strategies::StrategyName;

/// Configuration for the transcript extraction pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Enabled strategies; priority order is fixed regardless of listing order
    pub strategies: Vec<StrategyName>,

    /// Per-strategy time budgets
    pub timeouts: TimeoutConfig,

    /// Direct page/caption scraping settings
    pub http: HttpConfig,

    /// Remote extraction service settings
    pub remote: RemoteServiceConfig,

    /// Headless browser settings
    pub browser: BrowserSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Overall budget for the direct scrape strategy (seconds)
    pub direct_scrape_secs: u64,

    /// Overall budget for the remote service strategy (seconds)
    pub remote_service_secs: u64,

    /// Overall budget for the browser strategy (seconds)
    pub browser_secs: u64,

    /// Page load bound inside the browser budget (seconds)
    pub navigation_secs: u64,

    /// Single HTTP request bound (seconds)
    pub http_request_secs: u64,
}

impl TimeoutConfig {
    pub fn direct_scrape(&self) -> Duration {
        Duration::from_secs(self.direct_scrape_secs)
    }

    pub fn remote_service(&self) -> Duration {
        Duration::from_secs(self.remote_service_secs)
    }

    pub fn browser(&self) -> Duration {
        Duration::from_secs(self.browser_secs)
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_secs(self.navigation_secs)
    }

    pub fn http_request(&self) -> Duration {
        Duration::from_secs(self.http_request_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            direct_scrape_secs: 15,
            remote_service_secs: 15,
            browser_secs: 45,
            navigation_secs: 20,
            http_request_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Browser-like User-Agent; the platform degrades markup for unknown clients
    pub user_agent: String,

    /// Caption languages in order of preference (prefix match)
    pub preferred_languages: Vec<String>,

    /// Base URL of the video platform
    pub watch_base_url: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
            preferred_languages: vec!["en".to_string()],
            watch_base_url: "https://www.youtube.com".to_string(),
        }
    }
}

/// Caller-supplied credential for the remote extraction service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCredentials {
    pub api_key: String,
    /// Overrides the configured endpoint when set
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteServiceConfig {
    /// Service endpoint accepting transcript requests
    pub endpoint: Option<String>,

    /// API token
    pub api_key: Option<String>,

    /// Preferred caption language sent to the service
    pub language: String,
}

impl Default for RemoteServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Chrome/Chromium executable; auto-detected when unset
    pub executable: Option<PathBuf>,

    /// Run without a visible window
    pub headless: bool,

    /// Pass `--no-sandbox` (required in most containers)
    pub no_sandbox: bool,

    /// Additional command-line flags for the browser process
    pub extra_args: Vec<String>,

    /// Directory for failure screenshots and page dumps; disabled when unset
    pub artifacts_dir: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            no_sandbox: true,
            extra_args: vec![
                "--disable-gpu".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--mute-audio".to_string(),
                "--lang=en-US".to_string(),
            ],
            artifacts_dir: None,
        }
    }
}

/// Per-call overrides accepted by the extraction entry point
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub timeouts: Option<TimeoutConfig>,
    pub credentials: Option<RemoteCredentials>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategies: StrategyName::ALL.to_vec(),
            timeouts: TimeoutConfig::default(),
            http: HttpConfig::default(),
            remote: RemoteServiceConfig::default(),
            browser: BrowserSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from the first readable config file, else the environment
    pub fn load() -> Result<Self> {
        let mut config_paths = vec![
            PathBuf::from("yt-transcript.toml"),
            PathBuf::from("config/yt-transcript.toml"),
        ];
        if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME") {
            config_paths.push(PathBuf::from(dir).join("yt-transcript/config.toml"));
        } else if let Some(home) = std::env::var_os("HOME") {
            config_paths.push(PathBuf::from(home).join(".config/yt-transcript/config.toml"));
        }

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path.display());
                        return Ok(config.apply_env());
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config.apply_env())
    }

    /// Load configuration from environment variables over defaults
    pub fn from_env() -> Result<Self> {
        Ok(Self::default().apply_env())
    }

    /// Environment credentials and paths override file values
    fn apply_env(mut self) -> Self {
        if let Ok(api_key) = std::env::var("YT_TRANSCRIPT_API_KEY") {
            self.remote.api_key = Some(api_key);
        }

        if let Ok(endpoint) = std::env::var("YT_TRANSCRIPT_ENDPOINT") {
            self.remote.endpoint = Some(endpoint);
        }

        if let Ok(chrome) = std::env::var("YT_TRANSCRIPT_CHROME") {
            self.browser.executable = Some(PathBuf::from(chrome));
        }

        if let Ok(dir) = std::env::var("YT_TRANSCRIPT_ARTIFACTS_DIR") {
            self.browser.artifacts_dir = Some(PathBuf::from(dir));
        }

        if let Ok(lang) = std::env::var("YT_TRANSCRIPT_LANG") {
            let languages: Vec<String> = lang
                .split(',')
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
            if !languages.is_empty() {
                self.remote.language = languages[0].clone();
                self.http.preferred_languages = languages;
            }
        }

        self
    }

    /// Layer per-call options over this configuration
    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        if let Some(timeouts) = options.timeouts {
            self.timeouts = timeouts;
        }
        if let Some(credentials) = options.credentials {
            self.remote.api_key = Some(credentials.api_key);
            if credentials.endpoint.is_some() {
                self.remote.endpoint = credentials.endpoint;
            }
        }
        self
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let t = &self.timeouts;
        if t.direct_scrape_secs == 0
            || t.remote_service_secs == 0
            || t.browser_secs == 0
            || t.navigation_secs == 0
            || t.http_request_secs == 0
        {
            return Err(anyhow!("timeouts must be greater than 0"));
        }

        if t.navigation_secs >= t.browser_secs {
            return Err(anyhow!(
                "navigation timeout ({}s) must be shorter than the browser budget ({}s)",
                t.navigation_secs,
                t.browser_secs
            ));
        }

        if self.http.preferred_languages.is_empty() {
            return Err(anyhow!("preferred_languages must not be empty"));
        }

        if self.strategies.is_empty() {
            return Err(anyhow!("at least one strategy must be enabled"));
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    pub fn is_enabled(&self, strategy: StrategyName) -> bool {
        self.strategies.contains(&strategy)
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Transcript Extractor Configuration:\n\
            - Strategies: {}\n\
            - Timeouts: direct {}s, remote {}s, browser {}s (navigation {}s)\n\
            - Languages: {}\n\
            - Remote service: {}\n\
            - Browser artifacts: {}",
            self.strategies
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            self.timeouts.direct_scrape_secs,
            self.timeouts.remote_service_secs,
            self.timeouts.browser_secs,
            self.timeouts.navigation_secs,
            self.http.preferred_languages.join(", "),
            match (&self.remote.endpoint, &self.remote.api_key) {
                (Some(_), Some(_)) => "configured",
                _ => "not configured",
            },
            self.browser
                .artifacts_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "disabled".to_string()),
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.config.timeouts = timeouts;
        self
    }

    pub fn with_remote_service(mut self, endpoint: String, api_key: String) -> Self {
        self.config.remote.endpoint = Some(endpoint);
        self.config.remote.api_key = Some(api_key);
        self
    }

    pub fn with_languages(mut self, languages: Vec<String>) -> Self {
        self.config.http.preferred_languages = languages;
        self
    }

    pub fn with_watch_base_url(mut self, url: String) -> Self {
        self.config.http.watch_base_url = url;
        self
    }

    pub fn with_artifacts_dir(mut self, dir: PathBuf) -> Self {
        self.config.browser.artifacts_dir = Some(dir);
        self
    }

    pub fn with_chrome_executable(mut self, path: PathBuf) -> Self {
        self.config.browser.executable = Some(path);
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<StrategyName>) -> Self {
        self.config.strategies = strategies;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.timeouts.browser_secs, 45);
        assert!(config.timeouts.browser() > config.timeouts.direct_scrape());
        assert_eq!(config.strategies, StrategyName::ALL.to_vec());
        assert!(config.remote.api_key.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_remote_service("http://localhost:9000/v1/transcript".to_string(), "token".to_string())
            .with_languages(vec!["de".to_string(), "en".to_string()])
            .with_strategies(vec![StrategyName::DirectScrape])
            .build();

        assert_eq!(config.remote.api_key.as_deref(), Some("token"));
        assert_eq!(config.http.preferred_languages[0], "de");
        assert!(config.is_enabled(StrategyName::DirectScrape));
        assert!(!config.is_enabled(StrategyName::BrowserAutomation));
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().validate().is_ok());

        let mut config = Config::default();
        config.timeouts.navigation_secs = config.timeouts.browser_secs;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.timeouts.remote_service_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.http.preferred_languages.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            strategies = ["browser_automation", "direct_scrape"]

            [timeouts]
            browser_secs = 60

            [remote]
            endpoint = "https://extract.example.com/v1/transcript"
            "#,
        )
        .unwrap();

        assert_eq!(config.timeouts.browser_secs, 60);
        assert_eq!(config.timeouts.direct_scrape_secs, 15);
        assert_eq!(config.http.preferred_languages, vec!["en".to_string()]);
        assert!(config.is_enabled(StrategyName::BrowserAutomation));
        assert!(!config.is_enabled(StrategyName::RemoteService));
    }

    #[test]
    fn test_options_override_credentials() {
        let options = ExtractOptions {
            timeouts: Some(TimeoutConfig {
                direct_scrape_secs: 5,
                ..TimeoutConfig::default()
            }),
            credentials: Some(RemoteCredentials {
                api_key: "secret".to_string(),
                endpoint: Some("http://localhost:1/extract".to_string()),
            }),
        };

        let config = Config::default().with_options(options);
        assert_eq!(config.timeouts.direct_scrape_secs, 5);
        assert_eq!(config.remote.api_key.as_deref(), Some("secret"));
        assert_eq!(config.remote.endpoint.as_deref(), Some("http://localhost:1/extract"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("yt-transcript.toml");
        let config = ConfigBuilder::new()
            .with_artifacts_dir(PathBuf::from("/tmp/artifacts"))
            .build();

        config.save(path.to_str().unwrap()).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let reloaded: Config = toml::from_str(&raw).unwrap();
        assert_eq!(reloaded.browser.artifacts_dir, Some(PathBuf::from("/tmp/artifacts")));
        assert_eq!(reloaded.timeouts, config.timeouts);
    }
}
