use std::collections::BTreeMap;

use rivalwatch_core::CompetitorConfig;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::DbError;

/// Upsert competitors from the seed file, matching existing rows by name.
///
/// Returns the number of competitors processed (inserted or updated).
/// All upserts run inside a single transaction; if any operation fails
/// the entire batch is rolled back. Scan status and history are untouched.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_competitors(
    pool: &PgPool,
    competitors: &[CompetitorConfig],
) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut count = 0usize;

    for competitor in competitors {
        let handles: BTreeMap<&str, &str> = competitor
            .handles
            .iter()
            .map(|(platform, handle)| (platform.as_str(), handle.as_str()))
            .collect();
        let platforms: Vec<String> = competitor
            .platforms
            .iter()
            .map(|p| p.as_str().to_string())
            .collect();
        let frequency = i32::try_from(competitor.scan_frequency_minutes).unwrap_or(i32::MAX);

        sqlx::query(
            "INSERT INTO competitors (name, website_url, handles, platforms, scan_frequency_minutes, status) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (name) DO UPDATE SET \
                 website_url = EXCLUDED.website_url, \
                 handles = EXCLUDED.handles, \
                 platforms = EXCLUDED.platforms, \
                 scan_frequency_minutes = EXCLUDED.scan_frequency_minutes, \
                 status = EXCLUDED.status, \
                 updated_at = NOW()",
        )
        .bind(&competitor.name)
        .bind(&competitor.website_url)
        .bind(Json(&handles))
        .bind(&platforms)
        .bind(frequency)
        .bind(competitor.status.as_str())
        .execute(&mut *tx)
        .await?;

        count += 1;
    }

    tx.commit().await?;
    Ok(count)
}
