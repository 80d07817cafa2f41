//! Structured extraction from fetched content via an OpenAI-compatible
//! chat-completions service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rivalwatch_core::ExtractionConfig;
use serde_json::{json, Map, Value};

use crate::error::CrawlError;
use crate::settings::FetchSettings;

/// Result of one extraction attempt. `ok == false` means the caller should
/// keep the raw content and store no fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutcome {
    pub fields: Map<String, Value>,
    pub ok: bool,
}

impl ExtractionOutcome {
    #[must_use]
    pub fn passthrough() -> Self {
        Self {
            fields: Map::new(),
            ok: true,
        }
    }

    #[must_use]
    pub fn failed() -> Self {
        Self {
            fields: Map::new(),
            ok: false,
        }
    }
}

#[async_trait]
pub trait ExtractionAdapter: Send + Sync {
    /// Never fails outright: a disabled config is a passthrough and any
    /// strategy or service failure degrades to [`ExtractionOutcome::failed`].
    async fn extract(&self, content: &str, config: &ExtractionConfig) -> ExtractionOutcome;
}

pub struct LlmExtractor {
    client: Client,
    base_url: String,
}

impl LlmExtractor {
    /// # Errors
    ///
    /// Returns [`CrawlError::Http`] if the HTTP client cannot be constructed.
    pub fn new(settings: &FetchSettings) -> Result<Self, CrawlError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.extraction_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.extraction_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn try_extract(
        &self,
        content: &str,
        config: &ExtractionConfig,
    ) -> Result<Map<String, Value>, CrawlError> {
        config
            .validate()
            .map_err(|e| CrawlError::Extraction(e.to_string()))?;
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CrawlError::Extraction("no API key configured".to_string()))?;

        let chunks = if config.apply_chunking() {
            chunk_content(
                content,
                config.chunk_token_threshold(),
                config.overlap_rate(),
            )
        } else {
            vec![content.to_string()]
        };

        let mut merged = Map::new();
        for chunk in &chunks {
            let fields = self.request_fields(chunk, config, api_key).await?;
            merge_fields(&mut merged, fields);
        }
        Ok(merged)
    }

    async fn request_fields(
        &self,
        chunk: &str,
        config: &ExtractionConfig,
        api_key: &str,
    ) -> Result<Map<String, Value>, CrawlError> {
        let body = json!({
            "model": model_name(config.provider()),
            "response_format": { "type": "json_object" },
            "temperature": config.temperature(),
            "max_tokens": config.max_output_tokens(),
            "messages": [
                { "role": "system", "content": system_prompt(config) },
                { "role": "user", "content": chunk }
            ]
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CrawlError::Extraction(format!(
                "extraction service returned status {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        let content = body
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| CrawlError::Extraction("response has no message content".to_string()))?;

        match serde_json::from_str::<Value>(content)? {
            Value::Object(fields) => Ok(fields),
            other => Err(CrawlError::Extraction(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }
}

#[async_trait]
impl ExtractionAdapter for LlmExtractor {
    async fn extract(&self, content: &str, config: &ExtractionConfig) -> ExtractionOutcome {
        if !config.enabled {
            return ExtractionOutcome::passthrough();
        }

        match self.try_extract(content, config).await {
            Ok(fields) => ExtractionOutcome { fields, ok: true },
            Err(e) => {
                tracing::warn!(error = %e, "extraction failed; keeping raw content");
                ExtractionOutcome::failed()
            }
        }
    }
}

/// `"openai/gpt-4o-mini"` is sent as `"gpt-4o-mini"`.
fn model_name(provider: &str) -> &str {
    provider.split_once('/').map_or(provider, |(_, model)| model)
}

fn system_prompt(config: &ExtractionConfig) -> String {
    let mut prompt = String::from(
        "You extract structured data from web page content. Respond with a single JSON object.",
    );
    if let Some(schema) = &config.schema {
        prompt.push_str("\nThe object must conform to this JSON schema:\n");
        prompt.push_str(&schema.to_string());
    }
    if let Some(instruction) = config.instruction.as_deref().filter(|s| !s.trim().is_empty()) {
        prompt.push_str("\nInstruction: ");
        prompt.push_str(instruction);
    }
    prompt
}

/// Approximate token count used for chunking decisions.
#[must_use]
pub fn approx_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Split content into overlapping chunks of roughly `threshold` tokens.
/// Content at or under the threshold comes back as a single chunk.
#[must_use]
pub fn chunk_content(content: &str, threshold: usize, overlap_rate: f64) -> Vec<String> {
    if approx_tokens(content) <= threshold {
        return vec![content.to_string()];
    }

    let chars: Vec<char> = content.chars().collect();
    let chunk_chars = threshold.saturating_mul(4).max(1);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let overlap_chars = ((chunk_chars as f64) * overlap_rate.clamp(0.0, 0.99)).floor() as usize;
    let step = chunk_chars.saturating_sub(overlap_chars).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_chars).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// Fold one chunk's fields into the running result: arrays concatenate,
/// otherwise the first non-null value wins.
pub fn merge_fields(into: &mut Map<String, Value>, fields: Map<String, Value>) {
    for (key, value) in fields {
        match into.get_mut(&key) {
            None => {
                into.insert(key, value);
            }
            Some(Value::Array(existing)) => {
                if let Value::Array(more) = value {
                    existing.extend(more);
                }
            }
            Some(existing @ Value::Null) => *existing = value,
            Some(_) => {}
        }
    }
}
