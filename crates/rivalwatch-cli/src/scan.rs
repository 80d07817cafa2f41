//! Scan and status command handlers.
//!
//! Scans run in-process against the production store. Per-platform failures
//! land in the printed outcome; only failures to start or persist a scan
//! surface as errors.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rivalwatch_core::{AppConfig, Platform};
use rivalwatch_db::{MonitoringStore, PgStore};
use rivalwatch_monitor::{status, Monitor};

pub(crate) async fn build_monitor(config: &AppConfig) -> anyhow::Result<Monitor> {
    let pool = rivalwatch_db::connect_pool_from_config(config).await?;
    let store: Arc<dyn MonitoringStore> = Arc::new(PgStore::new(pool));
    Ok(Monitor::from_app_config(config, store)?)
}

/// Scan one competitor, on `platforms` when non-empty.
///
/// # Errors
///
/// Returns an error if the competitor does not exist, is already being
/// scanned, or the store fails.
pub(crate) async fn run_scan(
    monitor: &Monitor,
    competitor_id: i64,
    platforms: &[Platform],
) -> anyhow::Result<()> {
    let platforms = (!platforms.is_empty()).then_some(platforms);
    tracing::info!(competitor_id, platforms = ?platforms, "manual scan requested");
    let outcome = monitor
        .run_monitoring_for_competitor(competitor_id, platforms)
        .await?;

    let analyzed: Vec<&str> = outcome
        .platforms_analyzed
        .iter()
        .map(|p| p.as_str())
        .collect();
    println!(
        "competitor {}: {} ({} new or changed items; analyzed: {})",
        outcome.competitor_id,
        outcome.status,
        outcome.monitoring_record_count,
        if analyzed.is_empty() {
            "none".to_string()
        } else {
            analyzed.join(", ")
        }
    );
    for error in &outcome.errors {
        println!("  error: {error}");
    }
    Ok(())
}

pub(crate) async fn run_scan_due(monitor: &Monitor) -> anyhow::Result<()> {
    tracing::info!("manual due-scan sweep requested");
    let summary = monitor.run_due_scans(Utc::now()).await?;
    println!(
        "due: {}  completed: {}  failed: {}  skipped: {}  new or changed items: {}",
        summary.due, summary.completed, summary.failed, summary.skipped, summary.records
    );
    Ok(())
}

pub(crate) async fn run_status(config: &AppConfig, competitor_id: i64) -> anyhow::Result<()> {
    let pool = rivalwatch_db::connect_pool_from_config(config).await?;
    let store = PgStore::new(pool);

    let competitor = store
        .get_competitor(competitor_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("competitor {competitor_id} not found"))?;
    let Some(current) = store.get_monitoring_status(competitor_id).await? else {
        println!(
            "{} (id {competitor_id}): never scanned; due now",
            competitor.name
        );
        return Ok(());
    };

    println!("{} (id {competitor_id})", competitor.name);
    println!("  phase:                {:?}", status::phase(&current));
    println!("  scan started:         {}", fmt_time(current.scan_started_at));
    println!(
        "  last success:         {}",
        fmt_time(current.last_successful_scan)
    );
    println!("  last failure:         {}", fmt_time(current.last_failed_scan));
    println!("  consecutive failures: {}", current.consecutive_failures);
    println!(
        "  next scan:            {}",
        fmt_time(current.next_scheduled_scan)
    );
    if let Some(message) = &current.scan_error_message {
        println!("  last error:           {message}");
    }
    Ok(())
}

fn fmt_time(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M UTC").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_time_renders_dash_for_none() {
        assert_eq!(fmt_time(None), "-");
    }

    #[test]
    fn fmt_time_renders_minutes_in_utc() {
        let at = DateTime::parse_from_rfc3339("2026-05-01T10:07:59Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(fmt_time(Some(at)), "2026-05-01 10:07 UTC");
    }
}
