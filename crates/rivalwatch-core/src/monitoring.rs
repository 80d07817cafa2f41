//! Persisted monitoring shapes: change records, alerts, and per-competitor
//! scan status.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::competitors::Platform;
use crate::CoreError;

/// One observation of a competitor post that was new or had changed.
///
/// Append-only: rows are never mutated after creation. The latest row for a
/// `(competitor_id, platform, post_id)` holds the authoritative hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringRecord {
    pub competitor_id: i64,
    pub platform: Platform,
    pub post_id: String,
    pub post_url: Option<String>,
    pub content_text: String,
    pub content_hash: String,
    pub previous_content_hash: Option<String>,
    pub is_new_post: bool,
    pub is_content_change: bool,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    NewPost,
    ContentChange,
}

impl AlertType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::NewPost => "new_post",
            AlertType::ContentChange => "content_change",
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new_post" => Ok(AlertType::NewPost),
            "content_change" => Ok(AlertType::ContentChange),
            other => Err(CoreError::InvalidAlertType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertPriority {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AlertPriority::Low => "low",
            AlertPriority::Medium => "medium",
            AlertPriority::High => "high",
            AlertPriority::Critical => "critical",
        }
    }
}

impl std::fmt::Display for AlertPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertPriority {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(AlertPriority::Low),
            "medium" => Ok(AlertPriority::Medium),
            "high" => Ok(AlertPriority::High),
            "critical" => Ok(AlertPriority::Critical),
            other => Err(CoreError::InvalidAlertPriority(other.to_string())),
        }
    }
}

/// Typed alert metadata, stored as a JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMetadata {
    pub platform: Platform,
    pub post_id: String,
    pub post_url: Option<String>,
    pub content_hash: String,
    pub previous_content_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringAlert {
    /// Assigned by the store; `None` until persisted.
    pub id: Option<i64>,
    pub competitor_id: i64,
    pub alert_type: AlertType,
    pub priority: AlertPriority,
    pub title: String,
    pub message: String,
    pub metadata: AlertMetadata,
    pub is_read: bool,
    pub is_dismissed: bool,
    pub created_at: DateTime<Utc>,
}

/// Long-lived scan state for one competitor, mutated in place by the scan
/// orchestrator only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorMonitoringStatus {
    pub competitor_id: i64,
    pub is_scanning: bool,
    pub scan_started_at: Option<DateTime<Utc>>,
    pub last_successful_scan: Option<DateTime<Utc>>,
    pub last_failed_scan: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub scan_error_message: Option<String>,
    pub next_scheduled_scan: Option<DateTime<Utc>>,
}

impl CompetitorMonitoringStatus {
    /// A never-scanned competitor.
    #[must_use]
    pub fn idle(competitor_id: i64) -> Self {
        Self {
            competitor_id,
            is_scanning: false,
            scan_started_at: None,
            last_successful_scan: None,
            last_failed_scan: None,
            consecutive_failures: 0,
            scan_error_message: None,
            next_scheduled_scan: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_enums_round_trip_through_str() {
        for t in [AlertType::NewPost, AlertType::ContentChange] {
            assert_eq!(t.as_str().parse::<AlertType>().unwrap(), t);
        }
        for p in [
            AlertPriority::Low,
            AlertPriority::Medium,
            AlertPriority::High,
            AlertPriority::Critical,
        ] {
            assert_eq!(p.as_str().parse::<AlertPriority>().unwrap(), p);
        }
        assert!("urgent".parse::<AlertPriority>().is_err());
    }

    #[test]
    fn record_serializes_timestamps_as_rfc3339() {
        let detected_at = DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = MonitoringRecord {
            competitor_id: 7,
            platform: Platform::Website,
            post_id: "url-0123456789abcdef".to_string(),
            post_url: Some("https://acme.example".to_string()),
            content_text: "Hello".to_string(),
            content_hash: crate::content_hash("Hello"),
            previous_content_hash: None,
            is_new_post: true,
            is_content_change: false,
            detected_at,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["detected_at"], "2026-03-01T12:00:00Z");
        assert_eq!(value["platform"], "website");
    }

    #[test]
    fn idle_status_is_not_scanning() {
        let status = CompetitorMonitoringStatus::idle(3);
        assert!(!status.is_scanning);
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.next_scheduled_scan.is_none());
    }
}
