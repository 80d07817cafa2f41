//! Page fetching.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::CrawlError;
use crate::settings::FetchSettings;

/// A successful (2xx, non-empty) response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    pub content_type: Option<String>,
    pub body: String,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// # Errors
    ///
    /// - [`CrawlError::UnexpectedStatus`] for a non-2xx response.
    /// - [`CrawlError::EmptyBody`] when the body is blank.
    /// - [`CrawlError::Http`] or [`CrawlError::Timeout`] for transport failures.
    async fn fetch(&self, url: &str) -> Result<FetchedPage, CrawlError>;
}

/// `reqwest` fetcher with the monitor's fixed user-agent. Every request asks
/// intermediaries to skip their caches.
pub struct HttpFetcher {
    client: Client,
    max_body_bytes: usize,
}

/// Bytes of raw body read per character of kept content. Markup-heavy pages
/// shrink a lot on normalization, so the raw read needs headroom.
const BODY_BYTES_PER_CONTENT_CHAR: usize = 64;

/// Floor for the raw read so small `content_max_chars` values still see the
/// `<title>` and the start of the page.
const MIN_BODY_BYTES: usize = 256 * 1024;

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns [`CrawlError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed (e.g., invalid TLS config).
    pub fn new(settings: &FetchSettings) -> Result<Self, CrawlError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(settings.timeout_secs.min(10)))
            .user_agent(settings.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            max_body_bytes: max_body_bytes(settings.content_max_chars),
        })
    }
}

/// Cap on the raw response bytes read for one page.
#[must_use]
pub fn max_body_bytes(content_max_chars: usize) -> usize {
    content_max_chars
        .saturating_mul(BODY_BYTES_PER_CONTENT_CHAR)
        .max(MIN_BODY_BYTES)
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, CrawlError> {
        let mut response = self
            .client
            .get(url)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,text/plain;q=0.9,*/*;q=0.8",
            )
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .header(reqwest::header::PRAGMA, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let mut raw: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let room = self.max_body_bytes - raw.len();
            if chunk.len() > room {
                raw.extend_from_slice(&chunk[..room]);
                tracing::debug!(url, limit = self.max_body_bytes, "response body truncated");
                break;
            }
            raw.extend_from_slice(&chunk);
        }
        let body = String::from_utf8_lossy(&raw).into_owned();

        if body.trim().is_empty() {
            return Err(CrawlError::EmptyBody {
                url: url.to_string(),
            });
        }

        Ok(FetchedPage {
            url: final_url,
            content_type,
            body,
        })
    }
}
