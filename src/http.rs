/// Plain-text page fetching for the scraping strategy
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use crate::error::{ExtractionError, Result};

/// Fetches a URL and returns its body as text
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String>;
}

/// reqwest-backed fetcher with a browser User-Agent
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<String> {
        debug!("🌐 GET {}", url);

        let response = self
            .client
            .get(url)
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(ExtractionError::NotFound(format!("HTTP {} for {}", status, url)));
        }
        if !status.is_success() {
            return Err(ExtractionError::Network(format!("HTTP error {}: {}", status, url)));
        }

        let body = response.text().await?;
        debug!("📄 Downloaded {} characters", body.len());
        Ok(body)
    }
}
