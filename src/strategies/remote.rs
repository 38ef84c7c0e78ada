/// Remote extraction service strategy
///
/// Delegates extraction to a managed service over its HTTP API. The service
/// has changed its response schema more than once, so a local adapter
/// accepts every known shape and reduces it to `RawSegment`s.
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{StrategyName, TranscriptStrategy};
use crate::config::RemoteServiceConfig;
use crate::error::{ExtractionError, Result};
use crate::identifier::VideoId;
use crate::segments::{parse_timestamp, RawSegment};

lazy_static! {
    static ref CAPTION_LINE: Regex =
        Regex::new(r"^\s*\[?\s*(\d{1,2}(?::\d{1,2}){1,2}(?:\.\d+)?)\s*\]?\s*[-:]?\s*(.*)$").unwrap();
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceRequest<'a> {
    video_id: &'a str,
    url: String,
    language: &'a str,
}

/// Number that may arrive as a JSON number or a numeric string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NumberLike {
    Number(f64),
    Text(String),
}

impl NumberLike {
    fn value(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MillisecondSegment {
    #[serde(rename = "offsetMs", alias = "startMs", alias = "tStartMs", alias = "offset")]
    offset_ms: NumberLike,
    #[serde(default, alias = "snippet", alias = "caption")]
    text: String,
}

#[derive(Debug, Deserialize)]
struct SecondsSegment {
    #[serde(alias = "startSeconds", alias = "start_seconds", alias = "time")]
    start: NumberLike,
    #[serde(default, alias = "snippet", alias = "caption")]
    text: String,
}

/// Every response schema the service is known to emit
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ServicePayload {
    Failure { error: String },
    Wrapped { transcript: Box<ServicePayload> },
    Milliseconds { segments: Vec<MillisecondSegment> },
    Lines { lines: Vec<String> },
    Items(Vec<SecondsSegment>),
    WrappedItems { data: Vec<SecondsSegment> },
}

/// Reduce any known service response body to raw segments
pub fn parse_service_response(body: &str) -> Result<Vec<RawSegment>> {
    let payload: ServicePayload = serde_json::from_str(body)
        .map_err(|e| ExtractionError::Service(format!("unrecognized service response: {}", e)))?;
    adapt(payload)
}

fn adapt(payload: ServicePayload) -> Result<Vec<RawSegment>> {
    let segments: Vec<RawSegment> = match payload {
        ServicePayload::Failure { error } => {
            return Err(ExtractionError::Service(format!("service reported: {}", error)));
        }
        ServicePayload::Wrapped { transcript } => return adapt(*transcript),
        ServicePayload::Milliseconds { segments } => segments
            .into_iter()
            .filter_map(|s| Some(RawSegment::new(s.offset_ms.value()? / 1000.0, s.text)))
            .collect(),
        ServicePayload::Lines { lines } => lines.iter().filter_map(|l| parse_caption_line(l)).collect(),
        ServicePayload::Items(items) | ServicePayload::WrappedItems { data: items } => items
            .into_iter()
            .filter_map(|s| Some(RawSegment::new(s.start.value()?, s.text)))
            .collect(),
    };

    if segments.is_empty() {
        return Err(ExtractionError::NotFound("service returned no captions".to_string()));
    }
    Ok(segments)
}

/// `[1:05] text`, `1:05 text` or `01:02:03 - text`
fn parse_caption_line(line: &str) -> Option<RawSegment> {
    let captures = CAPTION_LINE.captures(line)?;
    let start = parse_timestamp(captures.get(1)?.as_str())?;
    let text = captures.get(2).map(|m| m.as_str().trim()).unwrap_or("");
    Some(RawSegment::new(start, text))
}

/// Managed extraction service client
pub struct RemoteServiceStrategy {
    client: Client,
    endpoint: Option<String>,
    api_key: Option<String>,
    language: String,
    watch_base_url: String,
    timeout: Duration,
}

impl RemoteServiceStrategy {
    pub fn from_config(config: &RemoteServiceConfig, watch_base_url: &str, timeout: Duration) -> Self {
        // request bound stays inside the orchestrator's budget
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            language: config.language.clone(),
            watch_base_url: watch_base_url.to_string(),
            timeout,
        }
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        let endpoint = self
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ExtractionError::NotConfigured("remote service endpoint not configured".to_string()))?;
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ExtractionError::NotConfigured("remote service API key not configured".to_string()))?;
        Ok((endpoint, api_key))
    }

    async fn request(&self, id: &VideoId) -> Result<Vec<RawSegment>> {
        let (endpoint, api_key) = self.credentials()?;

        let request = ServiceRequest {
            video_id: id.as_str(),
            url: id.watch_url(&self.watch_base_url),
            language: &self.language,
        };

        let url = format!(
            "{}?videoId={}",
            endpoint.trim_end_matches('/'),
            urlencoding::encode(id.as_str())
        );
        info!("🛰️ Requesting transcript from remote service");
        debug!("Remote service URL: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractionError::Service(format!("service unreachable: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExtractionError::Service(format!("failed to read service response: {}", e)))?;

        match status {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ExtractionError::Auth(format!("service rejected credentials ({})", status)));
            }
            StatusCode::NOT_FOUND => {
                return Err(ExtractionError::NotFound(format!("service has no transcript for {}", id)));
            }
            _ => {
                let snippet: String = body.chars().take(200).collect();
                return Err(ExtractionError::Service(format!("service error {}: {}", status, snippet)));
            }
        }

        let segments = parse_service_response(&body)?;
        info!("✅ Remote service returned {} segments", segments.len());
        Ok(segments)
    }
}

#[async_trait]
impl TranscriptStrategy for RemoteServiceStrategy {
    fn name(&self) -> &str {
        StrategyName::RemoteService.as_str()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn extract(&self, id: &VideoId) -> Result<Vec<RawSegment>> {
        self.request(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::normalize;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// One-shot HTTP server answering with `status` and `body`; yields the raw request
    async fn canned_service(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}/extract", addr), handle)
    }

    fn strategy_for(endpoint: String) -> RemoteServiceStrategy {
        let config = RemoteServiceConfig {
            endpoint: Some(endpoint),
            api_key: Some("secret-token".to_string()),
            ..RemoteServiceConfig::default()
        };
        RemoteServiceStrategy::from_config(&config, "https://www.youtube.com", Duration::from_secs(5))
    }

    async fn extract_with(status: &'static str, body: &'static str) -> Result<Vec<RawSegment>> {
        let (endpoint, server) = canned_service(status, body).await;
        let result = strategy_for(endpoint).extract(&normalize("jNQXAC9IVRw").unwrap()).await;
        server.await.unwrap();
        result
    }

    #[test]
    fn test_millisecond_schema() {
        let body = r#"{"segments":[{"offsetMs":3200,"text":"second"},{"startMs":"0","text":"first"}]}"#;
        let segments = parse_service_response(body).unwrap();
        assert_eq!(segments, vec![RawSegment::new(3.2, "second"), RawSegment::new(0.0, "first")]);
    }

    #[test]
    fn test_caption_line_schema() {
        let body = r#"{"lines":["[0:00] All right","0:03 so here we are","1:02:03 - late line","no timestamp"]}"#;
        let segments = parse_service_response(body).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1], RawSegment::new(3.0, "so here we are"));
        assert_eq!(segments[2], RawSegment::new(3723.0, "late line"));
    }

    #[test]
    fn test_structured_array_schemas() {
        let body = r#"[{"start":0.5,"text":"a"},{"startSeconds":"8","text":"b"}]"#;
        assert_eq!(parse_service_response(body).unwrap().len(), 2);

        let body = r#"{"data":[{"start":1.0,"text":"a"}]}"#;
        assert_eq!(parse_service_response(body).unwrap(), vec![RawSegment::new(1.0, "a")]);

        let body = r#"{"transcript":{"segments":[{"offsetMs":1000,"text":"wrapped"}]}}"#;
        assert_eq!(parse_service_response(body).unwrap(), vec![RawSegment::new(1.0, "wrapped")]);
    }

    #[test]
    fn test_service_failures_are_classified() {
        assert!(matches!(
            parse_service_response(r#"{"error":"quota exceeded"}"#),
            Err(ExtractionError::Service(_))
        ));
        assert!(matches!(
            parse_service_response(r#"{"unexpected":true}"#),
            Err(ExtractionError::Service(_))
        ));
        assert!(matches!(
            parse_service_response(r#"{"segments":[]}"#),
            Err(ExtractionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_credentials_is_not_configured() {
        let strategy = RemoteServiceStrategy::from_config(
            &RemoteServiceConfig::default(),
            "https://www.youtube.com",
            Duration::from_secs(5),
        );
        let id = normalize("jNQXAC9IVRw").unwrap();

        let err = strategy.extract(&id).await.unwrap_err();
        assert!(matches!(err, ExtractionError::NotConfigured(_)));

        let config = RemoteServiceConfig {
            endpoint: Some("http://127.0.0.1:9/extract".to_string()),
            api_key: Some("  ".to_string()),
            ..RemoteServiceConfig::default()
        };
        let strategy = RemoteServiceStrategy::from_config(&config, "https://www.youtube.com", Duration::from_secs(5));
        assert!(matches!(strategy.extract(&id).await, Err(ExtractionError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_success_body_goes_through_adapter() {
        let (endpoint, server) =
            canned_service("200 OK", r#"{"segments":[{"offsetMs":8000,"text":"late"},{"offsetMs":0,"text":"early"}]}"#)
                .await;
        let segments = strategy_for(endpoint)
            .extract(&normalize("jNQXAC9IVRw").unwrap())
            .await
            .unwrap();
        assert_eq!(segments, vec![RawSegment::new(8.0, "late"), RawSegment::new(0.0, "early")]);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /extract?videoId=jNQXAC9IVRw "));
        assert!(request.to_lowercase().contains("authorization: bearer secret-token"));
        assert!(request.contains(r#""videoId":"jNQXAC9IVRw""#));
    }

    #[tokio::test]
    async fn test_http_status_mapping() {
        assert!(matches!(extract_with("401 Unauthorized", "{}").await, Err(ExtractionError::Auth(_))));
        assert!(matches!(extract_with("403 Forbidden", "{}").await, Err(ExtractionError::Auth(_))));
        assert!(matches!(
            extract_with("404 Not Found", r#"{"error":"no such video"}"#).await,
            Err(ExtractionError::NotFound(_))
        ));
        assert!(matches!(
            extract_with("429 Too Many Requests", r#"{"error":"slow down"}"#).await,
            Err(ExtractionError::Service(_))
        ));
        assert!(matches!(
            extract_with("503 Service Unavailable", "upstream down").await,
            Err(ExtractionError::Service(_))
        ));
        assert!(matches!(
            extract_with("200 OK", r#"{"error":"quota exceeded"}"#).await,
            Err(ExtractionError::Service(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_service_error() {
        let config = RemoteServiceConfig {
            endpoint: Some("http://127.0.0.1:9/extract".to_string()),
            api_key: Some("token".to_string()),
            ..RemoteServiceConfig::default()
        };
        let strategy = RemoteServiceStrategy::from_config(&config, "https://www.youtube.com", Duration::from_secs(2));
        let id = normalize("jNQXAC9IVRw").unwrap();

        tokio_test::assert_err!(strategy.extract(&id).await);
        assert!(matches!(strategy.extract(&id).await, Err(ExtractionError::Service(_))));
    }
}
