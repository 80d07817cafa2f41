//! Database operations for the append-only `monitoring_records` table.

use chrono::{DateTime, Utc};
use rivalwatch_core::{MonitoringAlert, MonitoringRecord, Platform};
use sqlx::PgPool;

use crate::{alerts, DbError};

/// A row from the `monitoring_records` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MonitoringRecordRow {
    pub id: i64,
    pub competitor_id: i64,
    pub platform: String,
    pub post_id: String,
    pub post_url: Option<String>,
    pub content_text: String,
    pub content_hash: String,
    pub previous_content_hash: Option<String>,
    pub is_new_post: bool,
    pub is_content_change: bool,
    pub detected_at: DateTime<Utc>,
}

impl TryFrom<MonitoringRecordRow> for MonitoringRecord {
    type Error = DbError;

    fn try_from(row: MonitoringRecordRow) -> Result<Self, Self::Error> {
        let platform = row
            .platform
            .parse::<Platform>()
            .map_err(|_| DbError::InvalidColumn {
                column: "monitoring_records.platform",
                value: row.platform.clone(),
            })?;

        Ok(MonitoringRecord {
            competitor_id: row.competitor_id,
            platform,
            post_id: row.post_id,
            post_url: row.post_url,
            content_text: row.content_text,
            content_hash: row.content_hash,
            previous_content_hash: row.previous_content_hash,
            is_new_post: row.is_new_post,
            is_content_change: row.is_content_change,
            detected_at: row.detected_at,
        })
    }
}

/// The authoritative (most recent) record for one content item.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure, or
/// [`DbError::InvalidColumn`] if the stored platform is unknown.
pub async fn get_latest_monitoring_record(
    pool: &PgPool,
    competitor_id: i64,
    platform: Platform,
    post_id: &str,
) -> Result<Option<MonitoringRecord>, DbError> {
    let row = sqlx::query_as::<_, MonitoringRecordRow>(
        "SELECT id, competitor_id, platform, post_id, post_url, content_text, content_hash, \
                previous_content_hash, is_new_post, is_content_change, detected_at \
         FROM monitoring_records \
         WHERE competitor_id = $1 AND platform = $2 AND post_id = $3 \
         ORDER BY detected_at DESC, id DESC \
         LIMIT 1",
    )
    .bind(competitor_id)
    .bind(platform.as_str())
    .bind(post_id)
    .fetch_optional(pool)
    .await?;

    row.map(MonitoringRecord::try_from).transpose()
}

/// Append a record and return its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_monitoring_record<'e, E>(
    executor: E,
    record: &MonitoringRecord,
) -> Result<i64, DbError>
where
    E: sqlx::PgExecutor<'e>,
{
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO monitoring_records \
             (competitor_id, platform, post_id, post_url, content_text, content_hash, \
              previous_content_hash, is_new_post, is_content_change, detected_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING id",
    )
    .bind(record.competitor_id)
    .bind(record.platform.as_str())
    .bind(&record.post_id)
    .bind(&record.post_url)
    .bind(&record.content_text)
    .bind(&record.content_hash)
    .bind(&record.previous_content_hash)
    .bind(record.is_new_post)
    .bind(record.is_content_change)
    .bind(record.detected_at)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// Append a record and its alert in one transaction; either both rows land
/// or neither does. Returns `(record_id, alert_id)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either insert or the commit fails.
pub async fn insert_record_with_alert(
    pool: &PgPool,
    record: &MonitoringRecord,
    alert: &MonitoringAlert,
) -> Result<(i64, i64), DbError> {
    let mut tx = pool.begin().await?;
    let record_id = insert_monitoring_record(&mut *tx, record).await?;
    let alert_id = alerts::insert_alert(&mut *tx, alert).await?;
    tx.commit().await?;
    Ok((record_id, alert_id))
}
