use rivalwatch_core::Platform;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("competitor {0} not found")]
    NotFound(i64),

    #[error("competitor {0} is already being scanned")]
    AlreadyScanning(i64),

    #[error("store error: {0}")]
    Store(#[from] rivalwatch_db::DbError),

    #[error("crawl engine setup failed: {0}")]
    Engine(#[from] rivalwatch_crawler::CrawlError),

    #[error("collector setup failed: {0}")]
    Collector(#[from] CollectorError),
}

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} for {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("failed to parse feed {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("no {0} handle configured")]
    MissingHandle(Platform),

    #[error("no collector registered for {0}")]
    NoCollector(Platform),
}
