//! Scan orchestration: one competitor at a time, every platform isolated
//! from the others, status transitions persisted around the run.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use rivalwatch_core::{
    AppConfig, Competitor, CompetitorMonitoringStatus, ContentItem, CrawlResult, Platform,
};
use rivalwatch_crawler::{CrawlEngine, EngineSettings};
use rivalwatch_db::MonitoringStore;

use crate::collectors::{CollectorRegistry, FeedCollector};
use crate::detector::ChangeDetector;
use crate::error::MonitorError;
use crate::status;
use crate::types::{DueScanSummary, MonitorSettings, ScanOutcome, ScanStatus};

/// What one platform contributed to a scan.
#[derive(Debug, Default)]
struct PlatformReport {
    ok: bool,
    records: usize,
    errors: Vec<String>,
}

/// The scan pipeline service. Construct once per process and share by
/// reference.
pub struct Monitor {
    store: Arc<dyn MonitoringStore>,
    engine: Arc<CrawlEngine>,
    collectors: CollectorRegistry,
    detector: ChangeDetector,
    settings: MonitorSettings,
    claims: Mutex<HashSet<i64>>,
}

impl Monitor {
    #[must_use]
    pub fn new(
        store: Arc<dyn MonitoringStore>,
        engine: Arc<CrawlEngine>,
        collectors: CollectorRegistry,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            detector: ChangeDetector::new(Arc::clone(&store)),
            store,
            engine,
            collectors,
            settings,
            claims: Mutex::new(HashSet::new()),
        }
    }

    /// Production wiring: HTTP crawling under the configured strategy and
    /// feed collection for `rss` and `youtube`.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Engine`] or [`MonitorError::Collector`] if an
    /// HTTP client or the worker launcher cannot be built.
    pub fn from_app_config(
        config: &AppConfig,
        store: Arc<dyn MonitoringStore>,
    ) -> Result<Self, MonitorError> {
        let engine_settings = EngineSettings::from_app_config(config);
        let feeds = FeedCollector::new(&engine_settings.fetch)?;
        let engine = CrawlEngine::from_settings(engine_settings)?;
        Ok(Self::new(
            store,
            Arc::new(engine),
            CollectorRegistry::with_feeds(feeds),
            MonitorSettings::from_app_config(config),
        ))
    }

    #[must_use]
    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Scan one competitor on `platforms`, or on every platform it is
    /// configured for when `platforms` is `None`.
    ///
    /// Platform failures are collected into the outcome; the call only errors
    /// when the scan cannot start or its status cannot be persisted.
    ///
    /// # Errors
    ///
    /// - [`MonitorError::NotFound`] if the competitor does not exist.
    /// - [`MonitorError::AlreadyScanning`] if a live scan holds the competitor.
    /// - [`MonitorError::Store`] if the store fails outside per-item detection.
    pub async fn run_monitoring_for_competitor(
        &self,
        competitor_id: i64,
        platforms: Option<&[Platform]>,
    ) -> Result<ScanOutcome, MonitorError> {
        let competitor = self
            .store
            .get_competitor(competitor_id)
            .await?
            .ok_or(MonitorError::NotFound(competitor_id))?;

        let _claim = self.claim(competitor_id)?;

        let current = self
            .store
            .get_monitoring_status(competitor_id)
            .await?
            .unwrap_or_else(|| CompetitorMonitoringStatus::idle(competitor_id));
        let scanning = status::begin(&current, Utc::now(), self.settings.stale_scan_after)?;
        self.store.upsert_monitoring_status(&scanning).await?;

        let platforms: Vec<Platform> = platforms.map_or_else(
            || competitor.platforms.clone(),
            <[Platform]>::to_vec,
        );
        tracing::info!(
            competitor_id,
            competitor = %competitor.name,
            platforms = ?platforms,
            "scan started"
        );

        let mut outcome = ScanOutcome {
            competitor_id,
            status: ScanStatus::Failed,
            platforms_analyzed: Vec::new(),
            monitoring_record_count: 0,
            errors: Vec::new(),
        };
        if platforms.is_empty() {
            outcome.errors.push("no platforms to scan".to_string());
        }

        for platform in platforms {
            // A panicking collector must not leave the status stuck in
            // `is_scanning`; it counts as that platform failing.
            let report = match AssertUnwindSafe(self.scan_platform(&competitor, platform))
                .catch_unwind()
                .await
            {
                Ok(report) => report,
                Err(payload) => {
                    let reason = panic_message(&*payload);
                    tracing::error!(
                        competitor_id,
                        %platform,
                        panic = %reason,
                        "platform scan panicked"
                    );
                    PlatformReport {
                        errors: vec![format!("{platform}: platform scan panicked: {reason}")],
                        ..PlatformReport::default()
                    }
                }
            };
            outcome.monitoring_record_count += report.records;
            outcome.errors.extend(report.errors);
            if report.ok {
                outcome.platforms_analyzed.push(platform);
            }
        }

        let now = Utc::now();
        let frequency = Duration::minutes(i64::from(competitor.scan_frequency_minutes));
        let finished = if outcome.platforms_analyzed.is_empty() {
            let message = if outcome.errors.is_empty() {
                "no platform produced results".to_string()
            } else {
                outcome.errors.join("; ")
            };
            tracing::error!(competitor_id, error = %message, "scan failed");
            status::fail(
                &scanning,
                now,
                frequency,
                self.settings.max_backoff,
                message,
            )
        } else {
            outcome.status = ScanStatus::Completed;
            if !outcome.errors.is_empty() {
                tracing::warn!(
                    competitor_id,
                    errors = outcome.errors.len(),
                    "scan completed with platform errors"
                );
            }
            status::succeed(&scanning, now, frequency)
        };
        self.store.upsert_monitoring_status(&finished).await?;

        tracing::info!(
            competitor_id,
            status = %outcome.status,
            platforms_analyzed = outcome.platforms_analyzed.len(),
            records = outcome.monitoring_record_count,
            consecutive_failures = finished.consecutive_failures,
            next_scheduled_scan = ?finished.next_scheduled_scan,
            "scan finished"
        );
        Ok(outcome)
    }

    /// Scan every competitor that is due at `now`, at most
    /// `max_concurrent_scans` at a time. One competitor's failure never stops
    /// the sweep.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Store`] only if the due list cannot be read.
    pub async fn run_due_scans(&self, now: DateTime<Utc>) -> Result<DueScanSummary, MonitorError> {
        let due = self.store.list_due_competitors(now).await?;
        let mut summary = DueScanSummary {
            due: due.len(),
            ..DueScanSummary::default()
        };
        if due.is_empty() {
            tracing::debug!("no competitors due");
            return Ok(summary);
        }
        tracing::info!(due = due.len(), "running due scans");

        let results: Vec<(i64, Result<ScanOutcome, MonitorError>)> = stream::iter(due)
            .map(|id| async move { (id, self.run_monitoring_for_competitor(id, None).await) })
            .buffer_unordered(self.settings.max_concurrent_scans.max(1))
            .collect()
            .await;

        for (competitor_id, result) in results {
            match result {
                Ok(outcome) => {
                    summary.records += outcome.monitoring_record_count;
                    match outcome.status {
                        ScanStatus::Completed => summary.completed += 1,
                        ScanStatus::Failed => summary.failed += 1,
                    }
                }
                Err(MonitorError::AlreadyScanning(_)) => {
                    tracing::debug!(competitor_id, "skipping competitor with a scan in progress");
                    summary.skipped += 1;
                }
                Err(e) => {
                    tracing::error!(competitor_id, error = %e, "scan could not run");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            due = summary.due,
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            records = summary.records,
            "due scans finished"
        );
        Ok(summary)
    }

    async fn scan_platform(&self, competitor: &Competitor, platform: Platform) -> PlatformReport {
        let mut report = PlatformReport::default();

        let items = if platform.is_crawlable() {
            self.crawl_platform(competitor, platform, &mut report.errors).await
        } else {
            match self.collectors.collect(competitor, platform).await {
                Ok(items) => Some(items),
                Err(e) => {
                    tracing::warn!(
                        competitor_id = competitor.id,
                        %platform,
                        error = %e,
                        "platform collection failed"
                    );
                    report.errors.push(format!("{platform}: {e}"));
                    None
                }
            }
        };
        let Some(items) = items else {
            return report;
        };

        let now = Utc::now();
        let mut detection_failed = false;
        for item in &items {
            match self
                .detector
                .process_item(competitor.id, platform, item, now)
                .await
            {
                Ok(record) if record.is_new_post || record.is_content_change => {
                    report.records += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        competitor_id = competitor.id,
                        %platform,
                        url = %item.url,
                        error = %e,
                        "failed to record content"
                    );
                    report.errors.push(format!("{platform}: {}: {e}", item.url));
                    detection_failed = true;
                }
            }
        }

        report.ok = !detection_failed;
        report
    }

    /// Returns `None` when the platform produced nothing usable.
    async fn crawl_platform(
        &self,
        competitor: &Competitor,
        platform: Platform,
        errors: &mut Vec<String>,
    ) -> Option<Vec<ContentItem>> {
        let targets = competitor.crawl_targets(platform);
        if targets.is_empty() {
            errors.push(format!("{platform}: no crawl targets configured"));
            return None;
        }

        let results = self
            .engine
            .crawl_batch(&targets, &self.settings.extraction, self.settings.strategy)
            .await;

        errors.extend(
            results
                .iter()
                .filter(|r| !r.is_success())
                .map(|r| describe_failure(platform, r)),
        );
        let items: Vec<ContentItem> = results.iter().filter_map(ContentItem::from_crawl).collect();
        if items.is_empty() {
            tracing::warn!(
                competitor_id = competitor.id,
                %platform,
                targets = targets.len(),
                "every crawl target failed"
            );
            return None;
        }
        Some(items)
    }

    fn claim(&self, competitor_id: i64) -> Result<ClaimGuard<'_>, MonitorError> {
        if !self.lock_claims().insert(competitor_id) {
            return Err(MonitorError::AlreadyScanning(competitor_id));
        }
        Ok(ClaimGuard {
            monitor: self,
            competitor_id,
        })
    }

    // Each critical section is a single set insert or remove.
    fn lock_claims(&self) -> MutexGuard<'_, HashSet<i64>> {
        self.claims.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases an in-process scan claim when the scan ends, however it ends.
struct ClaimGuard<'a> {
    monitor: &'a Monitor,
    competitor_id: i64,
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        self.monitor.lock_claims().remove(&self.competitor_id);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn describe_failure(platform: Platform, result: &CrawlResult) -> String {
    format!(
        "{platform}: {} {}: {}",
        result.url,
        result.status,
        result.error.as_deref().unwrap_or("unknown error")
    )
}
