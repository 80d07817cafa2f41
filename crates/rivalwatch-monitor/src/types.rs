use chrono::Duration;
use rivalwatch_core::{AppConfig, ExtractionConfig, IsolationStrategy, Platform};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Completed,
    Failed,
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Completed => write!(f, "completed"),
            ScanStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Result of one competitor scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub competitor_id: i64,
    pub status: ScanStatus,
    /// Platforms that produced results without a fatal error.
    pub platforms_analyzed: Vec<Platform>,
    /// Records persisted by this scan (new posts plus content changes).
    pub monitoring_record_count: usize,
    pub errors: Vec<String>,
}

/// Totals for one sweep over every due competitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueScanSummary {
    pub due: usize,
    pub completed: usize,
    pub failed: usize,
    /// Competitors another scan already held.
    pub skipped: usize,
    pub records: usize,
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub strategy: IsolationStrategy,
    /// Applied to every crawlable-platform fetch.
    pub extraction: ExtractionConfig,
    /// Upper bound on the failure backoff.
    pub max_backoff: Duration,
    /// A scan lock older than this is treated as abandoned.
    pub stale_scan_after: Duration,
    pub max_concurrent_scans: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            strategy: IsolationStrategy::default(),
            extraction: ExtractionConfig::disabled(),
            max_backoff: Duration::minutes(1440),
            stale_scan_after: Duration::minutes(120),
            max_concurrent_scans: 2,
        }
    }
}

impl MonitorSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            strategy: config.crawl_strategy,
            extraction: ExtractionConfig::disabled(),
            max_backoff: minutes(config.scan_max_backoff_minutes),
            stale_scan_after: minutes(config.stale_scan_minutes),
            max_concurrent_scans: config.max_concurrent_scans.max(1),
        }
    }
}

/// Ten years; keeps configured intervals inside `Duration`'s range.
const MAX_INTERVAL_MINUTES: u64 = 60 * 24 * 365 * 10;

fn minutes(value: u64) -> Duration {
    Duration::minutes(i64::try_from(value.min(MAX_INTERVAL_MINUTES)).unwrap_or(0))
}
