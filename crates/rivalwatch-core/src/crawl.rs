//! Crawl task and result types shared by the crawl engine, its worker
//! processes, and the scan orchestrator.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::hash::{content_hash, derive_post_id};
use crate::CoreError;

pub const DEFAULT_PROVIDER: &str = "openai/gpt-4o-mini";
pub const DEFAULT_CHUNK_TOKEN_THRESHOLD: usize = 2048;
pub const DEFAULT_OVERLAP_RATE: f64 = 0.1;
pub const DEFAULT_TEMPERATURE: f64 = 0.0;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;

/// Which representation of a page is handed to the extraction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    #[default]
    Markdown,
    Html,
    Text,
}

/// Structured-extraction settings for one crawl call.
///
/// Every field except `enabled` is optional; absent values resolve to the
/// adapter defaults through the accessor methods.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub enabled: bool,
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub schema: Option<Value>,
    pub instruction: Option<String>,
    pub chunk_token_threshold: Option<usize>,
    pub overlap_rate: Option<f64>,
    pub apply_chunking: Option<bool>,
    pub input_format: Option<InputFormat>,
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
}

impl std::fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("enabled", &self.enabled)
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("schema", &self.schema)
            .field("instruction", &self.instruction)
            .field("chunk_token_threshold", &self.chunk_token_threshold)
            .field("overlap_rate", &self.overlap_rate)
            .field("apply_chunking", &self.apply_chunking)
            .field("input_format", &self.input_format)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

impl ExtractionConfig {
    /// Extraction switched off; the crawl keeps raw content only.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        self.provider.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }

    #[must_use]
    pub fn chunk_token_threshold(&self) -> usize {
        self.chunk_token_threshold
            .unwrap_or(DEFAULT_CHUNK_TOKEN_THRESHOLD)
    }

    #[must_use]
    pub fn overlap_rate(&self) -> f64 {
        self.overlap_rate.unwrap_or(DEFAULT_OVERLAP_RATE)
    }

    #[must_use]
    pub fn apply_chunking(&self) -> bool {
        self.apply_chunking.unwrap_or(true)
    }

    #[must_use]
    pub fn input_format(&self) -> InputFormat {
        self.input_format.unwrap_or_default()
    }

    #[must_use]
    pub fn temperature(&self) -> f64 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    #[must_use]
    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS)
    }

    /// Validate value ranges once, at the boundary where the config enters
    /// the system.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidExtractionConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |msg: String| Err(CoreError::InvalidExtractionConfig(msg));

        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return invalid(format!("temperature {t} outside [0, 2]"));
            }
        }
        if let Some(rate) = self.overlap_rate {
            if !(0.0..1.0).contains(&rate) {
                return invalid(format!("overlap_rate {rate} outside [0, 1)"));
            }
        }
        if self.chunk_token_threshold == Some(0) {
            return invalid("chunk_token_threshold must be greater than zero".to_string());
        }
        if self.max_output_tokens == Some(0) {
            return invalid("max_output_tokens must be greater than zero".to_string());
        }
        if let Some(schema) = &self.schema {
            if !schema.is_object() {
                return invalid("schema must be a JSON object".to_string());
            }
        }
        if let Some(provider) = &self.provider {
            if provider.split_once('/').is_none_or(|(v, m)| v.is_empty() || m.is_empty()) {
                return invalid(format!(
                    "provider '{provider}' must look like '<vendor>/<model>'"
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlStatus {
    Success,
    /// The target answered but the page is unusable (non-2xx, empty body).
    Failed,
    /// Transport failure, timeout, or the isolation unit itself broke.
    Error,
}

impl std::fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrawlStatus::Success => write!(f, "success"),
            CrawlStatus::Failed => write!(f, "failed"),
            CrawlStatus::Error => write!(f, "error"),
        }
    }
}

/// Outcome of crawling one URL. Exactly one is produced per input URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlResult {
    pub url: String,
    pub status: CrawlStatus,
    pub title: Option<String>,
    pub content: String,
    #[serde(default)]
    pub extracted_data: Map<String, Value>,
    pub content_hash: String,
    pub crawled_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl CrawlResult {
    /// A successful crawl. `content_hash` is computed over `content`.
    #[must_use]
    pub fn success(
        url: impl Into<String>,
        title: Option<String>,
        content: String,
        extracted_data: Map<String, Value>,
    ) -> Self {
        let content_hash = content_hash(&content);
        Self {
            url: url.into(),
            status: CrawlStatus::Success,
            title,
            content,
            extracted_data,
            content_hash,
            crawled_at: Utc::now(),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::unsuccessful(url.into(), CrawlStatus::Failed, message.into())
    }

    #[must_use]
    pub fn error(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::unsuccessful(url.into(), CrawlStatus::Error, message.into())
    }

    fn unsuccessful(url: String, status: CrawlStatus, message: String) -> Self {
        Self {
            url,
            status,
            title: None,
            content: String::new(),
            extracted_data: Map::new(),
            content_hash: String::new(),
            crawled_at: Utc::now(),
            error: Some(message),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == CrawlStatus::Success
    }
}

/// How worker processes are dispatched in the process-isolated strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessMode {
    Individual,
    Batched,
    Adaptive,
}

/// Isolation strategy for a `crawl_batch` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "mode")]
pub enum IsolationStrategy {
    /// Each fetch runs on its own disposable single-threaded scheduler.
    Cooperative,
    /// Each fetch or batch runs in a separate worker process.
    Process(ProcessMode),
}

impl Default for IsolationStrategy {
    fn default() -> Self {
        IsolationStrategy::Process(ProcessMode::Adaptive)
    }
}

impl std::fmt::Display for IsolationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IsolationStrategy::Cooperative => write!(f, "cooperative"),
            IsolationStrategy::Process(ProcessMode::Individual) => write!(f, "process-individual"),
            IsolationStrategy::Process(ProcessMode::Batched) => write!(f, "process-batched"),
            IsolationStrategy::Process(ProcessMode::Adaptive) => write!(f, "process-adaptive"),
        }
    }
}

impl FromStr for IsolationStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cooperative" => Ok(IsolationStrategy::Cooperative),
            "process-individual" => Ok(IsolationStrategy::Process(ProcessMode::Individual)),
            "process-batched" => Ok(IsolationStrategy::Process(ProcessMode::Batched)),
            "process" | "process-adaptive" => Ok(IsolationStrategy::Process(ProcessMode::Adaptive)),
            other => Err(CoreError::InvalidStrategy(other.to_string())),
        }
    }
}

/// A piece of competitor content with a stable identity, as produced by the
/// crawl engine or by a platform collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub post_id: Option<String>,
    pub url: String,
    pub title: Option<String>,
    pub text: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl ContentItem {
    /// The item's stable identity: its own `post_id`, or one derived from its URL.
    #[must_use]
    pub fn identity(&self) -> String {
        self.post_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map_or_else(|| derive_post_id(&self.url), str::to_string)
    }

    /// Convert a successful crawl into a content item. Returns `None` for
    /// unsuccessful results, which carry no content to compare.
    #[must_use]
    pub fn from_crawl(result: &CrawlResult) -> Option<Self> {
        if !result.is_success() {
            return None;
        }
        Some(Self {
            post_id: None,
            url: result.url.clone(),
            title: result.title.clone(),
            text: result.content.clone(),
            published_at: Some(result.crawled_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extraction_defaults_apply_when_fields_absent() {
        let cfg = ExtractionConfig {
            enabled: true,
            ..ExtractionConfig::default()
        };
        assert_eq!(cfg.provider(), DEFAULT_PROVIDER);
        assert_eq!(cfg.chunk_token_threshold(), 2048);
        assert!((cfg.overlap_rate() - 0.1).abs() < f64::EPSILON);
        assert!(cfg.apply_chunking());
        assert_eq!(cfg.input_format(), InputFormat::Markdown);
        assert_eq!(cfg.max_output_tokens(), 1024);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn extraction_config_deserializes_from_partial_json() {
        let cfg: ExtractionConfig = serde_json::from_value(json!({
            "enabled": true,
            "instruction": "list the product names",
            "input_format": "html"
        }))
        .unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.input_format(), InputFormat::Html);
        assert!(cfg.schema.is_none());
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let bad_temp = ExtractionConfig {
            temperature: Some(3.5),
            ..ExtractionConfig::default()
        };
        assert!(bad_temp.validate().is_err());

        let bad_overlap = ExtractionConfig {
            overlap_rate: Some(1.0),
            ..ExtractionConfig::default()
        };
        assert!(bad_overlap.validate().is_err());

        let bad_schema = ExtractionConfig {
            schema: Some(json!(["not", "an", "object"])),
            ..ExtractionConfig::default()
        };
        assert!(bad_schema.validate().is_err());

        let bad_provider = ExtractionConfig {
            provider: Some("gpt-4o".to_string()),
            ..ExtractionConfig::default()
        };
        assert!(bad_provider.validate().is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let cfg = ExtractionConfig {
            api_key: Some("sk-live-123".to_string()),
            ..ExtractionConfig::default()
        };
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("sk-live-123"));
    }

    #[test]
    fn success_result_hashes_content_and_has_no_error() {
        let result = CrawlResult::success(
            "https://acme.example",
            Some("Acme".to_string()),
            "Hello".to_string(),
            Map::new(),
        );
        assert!(result.is_success());
        assert_eq!(result.content_hash, content_hash("Hello"));
        assert!(result.error.is_none());
    }

    #[test]
    fn unsuccessful_results_carry_an_error() {
        let failed = CrawlResult::failed("https://acme.example", "HTTP 404");
        assert_eq!(failed.status, CrawlStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("HTTP 404"));

        let errored = CrawlResult::error("https://acme.example", "timed out");
        assert_eq!(errored.status, CrawlStatus::Error);
        assert!(ContentItem::from_crawl(&errored).is_none());
    }

    #[test]
    fn strategy_parses_and_displays() {
        for raw in [
            "cooperative",
            "process-individual",
            "process-batched",
            "process-adaptive",
        ] {
            let strategy: IsolationStrategy = raw.parse().unwrap();
            assert_eq!(strategy.to_string(), raw);
        }
        assert_eq!(
            "process".parse::<IsolationStrategy>().unwrap(),
            IsolationStrategy::Process(ProcessMode::Adaptive)
        );
        assert!("fork".parse::<IsolationStrategy>().is_err());
    }

    #[test]
    fn content_item_identity_prefers_post_id() {
        let item = ContentItem {
            post_id: Some("vid-42".to_string()),
            url: "https://video.example/watch?v=42".to_string(),
            title: None,
            text: "launch video".to_string(),
            published_at: None,
        };
        assert_eq!(item.identity(), "vid-42");

        let anonymous = ContentItem {
            post_id: Some("   ".to_string()),
            ..item
        };
        assert_eq!(anonymous.identity(), derive_post_id(&anonymous.url));
    }
}
