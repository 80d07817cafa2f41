//! Database operations for `monitoring_alerts`.

use chrono::{DateTime, Utc};
use rivalwatch_core::{AlertMetadata, AlertPriority, AlertType, MonitoringAlert};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `monitoring_alerts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AlertRow {
    pub id: i64,
    pub competitor_id: i64,
    pub alert_type: String,
    pub priority: String,
    pub title: String,
    pub message: String,
    pub metadata: Json<AlertMetadata>,
    pub is_read: bool,
    pub is_dismissed: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AlertRow> for MonitoringAlert {
    type Error = DbError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        let alert_type = row
            .alert_type
            .parse::<AlertType>()
            .map_err(|_| DbError::InvalidColumn {
                column: "monitoring_alerts.alert_type",
                value: row.alert_type.clone(),
            })?;
        let priority = row
            .priority
            .parse::<AlertPriority>()
            .map_err(|_| DbError::InvalidColumn {
                column: "monitoring_alerts.priority",
                value: row.priority.clone(),
            })?;

        Ok(MonitoringAlert {
            id: Some(row.id),
            competitor_id: row.competitor_id,
            alert_type,
            priority,
            title: row.title,
            message: row.message,
            metadata: row.metadata.0,
            is_read: row.is_read,
            is_dismissed: row.is_dismissed,
            created_at: row.created_at,
        })
    }
}

/// Insert an alert and return its id. `alert.id` is ignored.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_alert<'e, E>(executor: E, alert: &MonitoringAlert) -> Result<i64, DbError>
where
    E: sqlx::PgExecutor<'e>,
{
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO monitoring_alerts \
             (competitor_id, alert_type, priority, title, message, metadata, \
              is_read, is_dismissed, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING id",
    )
    .bind(alert.competitor_id)
    .bind(alert.alert_type.as_str())
    .bind(alert.priority.as_str())
    .bind(&alert.title)
    .bind(&alert.message)
    .bind(Json(&alert.metadata))
    .bind(alert.is_read)
    .bind(alert.is_dismissed)
    .bind(alert.created_at)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// Newest alerts for a competitor.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure, or
/// [`DbError::InvalidColumn`] if a stored enum value is unknown.
pub async fn list_alerts(
    pool: &PgPool,
    competitor_id: i64,
    limit: i64,
) -> Result<Vec<MonitoringAlert>, DbError> {
    let rows = sqlx::query_as::<_, AlertRow>(
        "SELECT id, competitor_id, alert_type, priority, title, message, metadata, \
                is_read, is_dismissed, created_at \
         FROM monitoring_alerts \
         WHERE competitor_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(competitor_id)
    .bind(limit.max(0))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(MonitoringAlert::try_from).collect()
}

/// Update the read/dismissed flags of one alert. `None` keeps the stored value.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no alert has this id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn set_alert_flags(
    pool: &PgPool,
    alert_id: i64,
    is_read: Option<bool>,
    is_dismissed: Option<bool>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE monitoring_alerts \
         SET is_read = COALESCE($2, is_read), \
             is_dismissed = COALESCE($3, is_dismissed) \
         WHERE id = $1",
    )
    .bind(alert_id)
    .bind(is_read)
    .bind(is_dismissed)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
