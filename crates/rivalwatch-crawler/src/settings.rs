use std::path::PathBuf;

use rivalwatch_core::{AppConfig, ExtractionConfig};
use serde::{Deserialize, Serialize};

/// Per-fetch settings. Serialized into every worker request so a worker
/// process needs no configuration of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub content_max_chars: usize,
    /// Pause between consecutive fetches inside one batch.
    pub inter_fetch_delay_ms: u64,
    pub extraction_base_url: String,
    pub extraction_timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "rivalwatch/0.1 (automated competitor monitor)".to_string(),
            content_max_chars: 10_000,
            inter_fetch_delay_ms: 500,
            extraction_base_url: "https://api.openai.com/v1".to_string(),
            extraction_timeout_secs: 60,
        }
    }
}

#[derive(Clone)]
pub struct EngineSettings {
    pub fetch: FetchSettings,
    /// Cooperative strategy: in-flight fetch cap.
    pub max_concurrent: usize,
    /// Process strategy: concurrent worker processes.
    pub worker_pool_size: usize,
    pub batch_size: usize,
    pub worker_timeout_secs: u64,
    pub worker_bin: Option<PathBuf>,
    /// Used when an enabled [`ExtractionConfig`] carries no key of its own.
    pub fallback_api_key: Option<String>,
}

impl std::fmt::Debug for EngineSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSettings")
            .field("fetch", &self.fetch)
            .field("max_concurrent", &self.max_concurrent)
            .field("worker_pool_size", &self.worker_pool_size)
            .field("batch_size", &self.batch_size)
            .field("worker_timeout_secs", &self.worker_timeout_secs)
            .field("worker_bin", &self.worker_bin)
            .field(
                "fallback_api_key",
                &self.fallback_api_key.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            fetch: FetchSettings::default(),
            max_concurrent: 3,
            worker_pool_size: rivalwatch_core::app_config::default_worker_pool_size(),
            batch_size: 2,
            worker_timeout_secs: 300,
            worker_bin: None,
            fallback_api_key: None,
        }
    }
}

impl EngineSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            fetch: FetchSettings {
                timeout_secs: config.crawl_timeout_secs,
                user_agent: config.crawl_user_agent.clone(),
                content_max_chars: config.content_max_chars,
                inter_fetch_delay_ms: config.batch_delay_ms,
                extraction_base_url: config.extraction_base_url.clone(),
                extraction_timeout_secs: config.extraction_timeout_secs,
            },
            max_concurrent: config.crawl_max_concurrent,
            worker_pool_size: config.worker_pool_size,
            batch_size: config.batch_size,
            worker_timeout_secs: config.worker_timeout_secs,
            worker_bin: config.worker_bin.clone(),
            fallback_api_key: config.openai_api_key.clone(),
        }
    }

    /// Fill in the fallback API key so the config is self-contained when it
    /// crosses a process boundary.
    #[must_use]
    pub fn resolve_extraction(&self, config: &ExtractionConfig) -> ExtractionConfig {
        let mut resolved = config.clone();
        if resolved.enabled && resolved.api_key.is_none() {
            resolved.api_key.clone_from(&self.fallback_api_key);
        }
        resolved
    }
}
