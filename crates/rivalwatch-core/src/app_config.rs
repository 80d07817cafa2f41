use std::path::PathBuf;

use crate::crawl::IsolationStrategy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    /// Only commands that touch the store need this; `crawl` runs without it.
    pub database_url: Option<String>,
    pub env: Environment,
    pub log_level: String,
    pub competitors_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub crawl_timeout_secs: u64,
    pub crawl_user_agent: String,
    pub crawl_max_concurrent: usize,
    pub crawl_strategy: IsolationStrategy,
    pub worker_pool_size: usize,
    pub worker_bin: Option<PathBuf>,
    pub worker_timeout_secs: u64,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub content_max_chars: usize,
    pub extraction_base_url: String,
    pub extraction_timeout_secs: u64,
    pub openai_api_key: Option<String>,
    pub scan_max_backoff_minutes: u64,
    pub stale_scan_minutes: u64,
    pub max_concurrent_scans: usize,
    pub scheduler_cron: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("competitors_path", &self.competitors_path)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("crawl_timeout_secs", &self.crawl_timeout_secs)
            .field("crawl_user_agent", &self.crawl_user_agent)
            .field("crawl_max_concurrent", &self.crawl_max_concurrent)
            .field("crawl_strategy", &self.crawl_strategy)
            .field("worker_pool_size", &self.worker_pool_size)
            .field("worker_bin", &self.worker_bin)
            .field("worker_timeout_secs", &self.worker_timeout_secs)
            .field("batch_size", &self.batch_size)
            .field("batch_delay_ms", &self.batch_delay_ms)
            .field("content_max_chars", &self.content_max_chars)
            .field("extraction_base_url", &self.extraction_base_url)
            .field("extraction_timeout_secs", &self.extraction_timeout_secs)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("scan_max_backoff_minutes", &self.scan_max_backoff_minutes)
            .field("stale_scan_minutes", &self.stale_scan_minutes)
            .field("max_concurrent_scans", &self.max_concurrent_scans)
            .field("scheduler_cron", &self.scheduler_cron)
            .finish()
    }
}

/// Default worker pool size: one process per available CPU, never more than four.
#[must_use]
pub fn default_worker_pool_size() -> usize {
    std::thread::available_parallelism()
        .map_or(1, std::num::NonZeroUsize::get)
        .min(4)
}
