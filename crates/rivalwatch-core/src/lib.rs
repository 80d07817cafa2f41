pub mod app_config;
pub mod competitors;
pub mod config;
pub mod crawl;
pub mod hash;
pub mod monitoring;

pub use app_config::{AppConfig, Environment};
pub use competitors::{
    load_competitors, Competitor, CompetitorConfig, CompetitorStatus, CompetitorsFile, Platform,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use crawl::{
    ContentItem, CrawlResult, CrawlStatus, ExtractionConfig, InputFormat, IsolationStrategy,
    ProcessMode,
};
pub use hash::{content_hash, derive_post_id, normalize_url};
pub use monitoring::{
    AlertMetadata, AlertPriority, AlertType, CompetitorMonitoringStatus, MonitoringAlert,
    MonitoringRecord,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid platform: {0}")]
    InvalidPlatform(String),

    #[error("invalid competitor status: {0}")]
    InvalidCompetitorStatus(String),

    #[error("invalid isolation strategy: {0}")]
    InvalidStrategy(String),

    #[error("invalid alert type: {0}")]
    InvalidAlertType(String),

    #[error("invalid alert priority: {0}")]
    InvalidAlertPriority(String),

    #[error("invalid extraction config: {0}")]
    InvalidExtractionConfig(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read competitors file {path}: {source}")]
    CompetitorsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse competitors file: {0}")]
    CompetitorsFileParse(#[from] serde_yaml::Error),

    #[error("competitors config validation failed: {0}")]
    Validation(String),
}
