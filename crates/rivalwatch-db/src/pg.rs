use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rivalwatch_core::{
    Competitor, CompetitorMonitoringStatus, MonitoringAlert, MonitoringRecord, Platform,
};
use sqlx::PgPool;

use crate::{alerts, competitors, monitoring_records, monitoring_status, DbError, MonitoringStore};

/// Postgres-backed [`MonitoringStore`]. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MonitoringStore for PgStore {
    async fn get_competitor(&self, id: i64) -> Result<Option<Competitor>, DbError> {
        competitors::get_competitor(&self.pool, id).await
    }

    async fn list_due_competitors(&self, now: DateTime<Utc>) -> Result<Vec<i64>, DbError> {
        competitors::list_due_competitor_ids(&self.pool, now).await
    }

    async fn get_latest_monitoring_record(
        &self,
        competitor_id: i64,
        platform: Platform,
        post_id: &str,
    ) -> Result<Option<MonitoringRecord>, DbError> {
        monitoring_records::get_latest_monitoring_record(
            &self.pool,
            competitor_id,
            platform,
            post_id,
        )
        .await
    }

    async fn save_monitoring_record(&self, record: &MonitoringRecord) -> Result<i64, DbError> {
        monitoring_records::insert_monitoring_record(&self.pool, record).await
    }

    async fn create_alert(&self, alert: &MonitoringAlert) -> Result<i64, DbError> {
        alerts::insert_alert(&self.pool, alert).await
    }

    async fn save_record_with_alert(
        &self,
        record: &MonitoringRecord,
        alert: &MonitoringAlert,
    ) -> Result<(i64, i64), DbError> {
        monitoring_records::insert_record_with_alert(&self.pool, record, alert).await
    }

    async fn get_monitoring_status(
        &self,
        competitor_id: i64,
    ) -> Result<Option<CompetitorMonitoringStatus>, DbError> {
        monitoring_status::get_monitoring_status(&self.pool, competitor_id).await
    }

    async fn upsert_monitoring_status(
        &self,
        status: &CompetitorMonitoringStatus,
    ) -> Result<(), DbError> {
        monitoring_status::upsert_monitoring_status(&self.pool, status).await
    }

    async fn list_alerts(
        &self,
        competitor_id: i64,
        limit: i64,
    ) -> Result<Vec<MonitoringAlert>, DbError> {
        alerts::list_alerts(&self.pool, competitor_id, limit).await
    }

    async fn set_alert_flags(
        &self,
        alert_id: i64,
        is_read: Option<bool>,
        is_dismissed: Option<bool>,
    ) -> Result<(), DbError> {
        alerts::set_alert_flags(&self.pool, alert_id, is_read, is_dismissed).await
    }
}
