//! Database operations for `competitor_monitoring_status`.

use chrono::{DateTime, Utc};
use rivalwatch_core::CompetitorMonitoringStatus;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `competitor_monitoring_status` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MonitoringStatusRow {
    pub competitor_id: i64,
    pub is_scanning: bool,
    pub scan_started_at: Option<DateTime<Utc>>,
    pub last_successful_scan: Option<DateTime<Utc>>,
    pub last_failed_scan: Option<DateTime<Utc>>,
    /// The schema defines this as `INTEGER NOT NULL DEFAULT 0 CHECK (>= 0)`.
    pub consecutive_failures: i32,
    pub scan_error_message: Option<String>,
    pub next_scheduled_scan: Option<DateTime<Utc>>,
}

impl TryFrom<MonitoringStatusRow> for CompetitorMonitoringStatus {
    type Error = DbError;

    fn try_from(row: MonitoringStatusRow) -> Result<Self, Self::Error> {
        let consecutive_failures =
            u32::try_from(row.consecutive_failures).map_err(|_| DbError::InvalidColumn {
                column: "competitor_monitoring_status.consecutive_failures",
                value: row.consecutive_failures.to_string(),
            })?;

        Ok(CompetitorMonitoringStatus {
            competitor_id: row.competitor_id,
            is_scanning: row.is_scanning,
            scan_started_at: row.scan_started_at,
            last_successful_scan: row.last_successful_scan,
            last_failed_scan: row.last_failed_scan,
            consecutive_failures,
            scan_error_message: row.scan_error_message,
            next_scheduled_scan: row.next_scheduled_scan,
        })
    }
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_monitoring_status(
    pool: &PgPool,
    competitor_id: i64,
) -> Result<Option<CompetitorMonitoringStatus>, DbError> {
    let row = sqlx::query_as::<_, MonitoringStatusRow>(
        "SELECT competitor_id, is_scanning, scan_started_at, last_successful_scan, \
                last_failed_scan, consecutive_failures, scan_error_message, next_scheduled_scan \
         FROM competitor_monitoring_status \
         WHERE competitor_id = $1",
    )
    .bind(competitor_id)
    .fetch_optional(pool)
    .await?;

    row.map(CompetitorMonitoringStatus::try_from).transpose()
}

/// Insert or replace the status row for a competitor.
///
/// When the status leaves the scanning state, the competitor's
/// `last_scan_at` is stamped in the same transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either statement fails; the transaction is
/// rolled back.
pub async fn upsert_monitoring_status(
    pool: &PgPool,
    status: &CompetitorMonitoringStatus,
) -> Result<(), DbError> {
    let consecutive_failures = i32::try_from(status.consecutive_failures).unwrap_or(i32::MAX);
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO competitor_monitoring_status \
             (competitor_id, is_scanning, scan_started_at, last_successful_scan, \
              last_failed_scan, consecutive_failures, scan_error_message, next_scheduled_scan) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (competitor_id) DO UPDATE SET \
             is_scanning = EXCLUDED.is_scanning, \
             scan_started_at = EXCLUDED.scan_started_at, \
             last_successful_scan = EXCLUDED.last_successful_scan, \
             last_failed_scan = EXCLUDED.last_failed_scan, \
             consecutive_failures = EXCLUDED.consecutive_failures, \
             scan_error_message = EXCLUDED.scan_error_message, \
             next_scheduled_scan = EXCLUDED.next_scheduled_scan, \
             updated_at = NOW()",
    )
    .bind(status.competitor_id)
    .bind(status.is_scanning)
    .bind(status.scan_started_at)
    .bind(status.last_successful_scan)
    .bind(status.last_failed_scan)
    .bind(consecutive_failures)
    .bind(&status.scan_error_message)
    .bind(status.next_scheduled_scan)
    .execute(&mut *tx)
    .await?;

    let finished_at = status.last_successful_scan.max(status.last_failed_scan);
    if let (false, Some(at)) = (status.is_scanning, finished_at) {
        sqlx::query(
            "UPDATE competitors SET last_scan_at = $1, updated_at = NOW() \
             WHERE id = $2 AND (last_scan_at IS NULL OR last_scan_at < $1)",
        )
        .bind(at)
        .bind(status.competitor_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
