//! The data-store seam consumed by the scan pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rivalwatch_core::{
    Competitor, CompetitorMonitoringStatus, MonitoringAlert, MonitoringRecord, Platform,
};

use crate::DbError;

/// Persistence operations the scan pipeline needs.
///
/// Implemented by [`crate::PgStore`] for production and [`crate::MemoryStore`]
/// for tests and dry runs. Records and alerts are append-only; the only
/// permitted mutation of an alert is its read/dismissed flags.
#[async_trait]
pub trait MonitoringStore: Send + Sync {
    async fn get_competitor(&self, id: i64) -> Result<Option<Competitor>, DbError>;

    /// Ids of active competitors with no status row, or whose
    /// `next_scheduled_scan` is unset or not after `now`.
    async fn list_due_competitors(&self, now: DateTime<Utc>) -> Result<Vec<i64>, DbError>;

    /// Most recent record for one content item, ordered by `detected_at`
    /// and then insertion order.
    async fn get_latest_monitoring_record(
        &self,
        competitor_id: i64,
        platform: Platform,
        post_id: &str,
    ) -> Result<Option<MonitoringRecord>, DbError>;

    async fn save_monitoring_record(&self, record: &MonitoringRecord) -> Result<i64, DbError>;

    async fn create_alert(&self, alert: &MonitoringAlert) -> Result<i64, DbError>;

    /// Persist a new or changed record together with its alert. Both writes
    /// succeed or neither is visible. Returns `(record_id, alert_id)`.
    async fn save_record_with_alert(
        &self,
        record: &MonitoringRecord,
        alert: &MonitoringAlert,
    ) -> Result<(i64, i64), DbError>;

    async fn get_monitoring_status(
        &self,
        competitor_id: i64,
    ) -> Result<Option<CompetitorMonitoringStatus>, DbError>;

    async fn upsert_monitoring_status(
        &self,
        status: &CompetitorMonitoringStatus,
    ) -> Result<(), DbError>;

    /// Newest alerts first.
    async fn list_alerts(
        &self,
        competitor_id: i64,
        limit: i64,
    ) -> Result<Vec<MonitoringAlert>, DbError>;

    /// `None` leaves a flag unchanged. Returns [`DbError::NotFound`] for an
    /// unknown alert id.
    async fn set_alert_flags(
        &self,
        alert_id: i64,
        is_read: Option<bool>,
        is_dismissed: Option<bool>,
    ) -> Result<(), DbError>;
}
