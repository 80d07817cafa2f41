//! Competitor scan pipeline: orchestration, change detection, scan status
//! tracking, and collectors for non-crawlable platforms.

pub mod collectors;
pub mod detector;
pub mod error;
pub mod orchestrator;
pub mod status;
pub mod types;

pub use collectors::{CollectorRegistry, FeedCollector, PlatformCollector};
pub use detector::ChangeDetector;
pub use error::{CollectorError, MonitorError};
pub use orchestrator::Monitor;
pub use status::{backoff, ScanPhase};
pub use types::{DueScanSummary, MonitorSettings, ScanOutcome, ScanStatus};
