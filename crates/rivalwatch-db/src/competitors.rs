//! Database operations for the `competitors` table.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rivalwatch_core::{Competitor, CompetitorStatus, Platform};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `competitors` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CompetitorRow {
    pub id: i64,
    pub name: String,
    pub website_url: Option<String>,
    /// Platform name to handle, as stored in the `jsonb` column.
    pub handles: Json<BTreeMap<String, String>>,
    pub platforms: Vec<String>,
    pub scan_frequency_minutes: i32,
    pub status: String,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CompetitorRow> for Competitor {
    type Error = DbError;

    fn try_from(row: CompetitorRow) -> Result<Self, Self::Error> {
        // Unknown platform names are skipped so an older binary can still read
        // rows written by a newer one.
        let mut handles = BTreeMap::new();
        for (key, handle) in row.handles.0 {
            match key.parse::<Platform>() {
                Ok(platform) => {
                    handles.insert(platform, handle);
                }
                Err(_) => tracing::warn!(
                    competitor_id = row.id,
                    platform = %key,
                    "ignoring handle for unknown platform"
                ),
            }
        }

        let mut platforms = Vec::with_capacity(row.platforms.len());
        for name in &row.platforms {
            match name.parse::<Platform>() {
                Ok(platform) if !platforms.contains(&platform) => platforms.push(platform),
                Ok(_) => {}
                Err(_) => tracing::warn!(
                    competitor_id = row.id,
                    platform = %name,
                    "ignoring unknown platform"
                ),
            }
        }

        let status = row
            .status
            .parse::<CompetitorStatus>()
            .map_err(|_| DbError::InvalidColumn {
                column: "competitors.status",
                value: row.status.clone(),
            })?;

        let scan_frequency_minutes =
            u32::try_from(row.scan_frequency_minutes).map_err(|_| DbError::InvalidColumn {
                column: "competitors.scan_frequency_minutes",
                value: row.scan_frequency_minutes.to_string(),
            })?;

        Ok(Competitor {
            id: row.id,
            name: row.name,
            website_url: row.website_url,
            handles,
            platforms,
            scan_frequency_minutes,
            status,
            last_scan_at: row.last_scan_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Fetch one competitor by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on query failure, or
/// [`DbError::InvalidColumn`] if the stored row cannot be decoded.
pub async fn get_competitor(pool: &PgPool, id: i64) -> Result<Option<Competitor>, DbError> {
    let row = sqlx::query_as::<_, CompetitorRow>(
        "SELECT id, name, website_url, handles, platforms, scan_frequency_minutes, \
                status, last_scan_at, created_at, updated_at \
         FROM competitors \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(Competitor::try_from).transpose()
}

/// Ids of active competitors that are due for a scan at `now`, oldest
/// schedule first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_due_competitor_ids(
    pool: &PgPool,
    now: DateTime<Utc>,
) -> Result<Vec<i64>, DbError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT c.id \
         FROM competitors c \
         LEFT JOIN competitor_monitoring_status s ON s.competitor_id = c.id \
         WHERE c.status = 'active' \
           AND (s.competitor_id IS NULL \
                OR s.next_scheduled_scan IS NULL \
                OR s.next_scheduled_scan <= $1) \
         ORDER BY s.next_scheduled_scan ASC NULLS FIRST, c.id ASC",
    )
    .bind(now)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}
