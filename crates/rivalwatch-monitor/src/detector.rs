//! Content change detection: compares an item against the latest stored
//! record for its identity and persists a record plus an alert when it is
//! new or changed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rivalwatch_core::{
    content_hash, AlertMetadata, AlertPriority, AlertType, ContentItem, MonitoringAlert,
    MonitoringRecord, Platform,
};
use rivalwatch_db::{DbError, MonitoringStore};

/// Longest item title quoted in an alert.
const ALERT_TITLE_MAX_CHARS: usize = 120;

pub struct ChangeDetector {
    store: Arc<dyn MonitoringStore>,
}

impl ChangeDetector {
    #[must_use]
    pub fn new(store: Arc<dyn MonitoringStore>) -> Self {
        Self { store }
    }

    /// Classify `item` as new, changed, or unchanged.
    ///
    /// New and changed items are persisted with one alert each, in a single
    /// atomic store write, so a failed write leaves the item to be re-detected
    /// on the next scan. An unchanged
    /// item returns a record with both flags false that is **not** persisted.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store cannot be read or written.
    pub async fn process_item(
        &self,
        competitor_id: i64,
        platform: Platform,
        item: &ContentItem,
        now: DateTime<Utc>,
    ) -> Result<MonitoringRecord, DbError> {
        let post_id = item.identity();
        let hash = content_hash(&item.text);
        let previous = self
            .store
            .get_latest_monitoring_record(competitor_id, platform, &post_id)
            .await?;

        let (is_new_post, is_content_change, previous_content_hash) = match previous {
            None => (true, false, None),
            Some(prev) if prev.content_hash != hash => (false, true, Some(prev.content_hash)),
            Some(_) => (false, false, None),
        };

        let record = MonitoringRecord {
            competitor_id,
            platform,
            post_id,
            post_url: Some(item.url.clone()),
            content_text: item.text.clone(),
            content_hash: hash,
            previous_content_hash,
            is_new_post,
            is_content_change,
            detected_at: now,
        };

        if !is_new_post && !is_content_change {
            tracing::debug!(
                competitor_id,
                %platform,
                post_id = %record.post_id,
                "content unchanged"
            );
            return Ok(record);
        }

        let alert = build_alert(&record, item.title.as_deref());
        let (record_id, alert_id) = self.store.save_record_with_alert(&record, &alert).await?;
        tracing::info!(
            competitor_id,
            %platform,
            post_id = %record.post_id,
            record_id,
            alert_id,
            alert_type = %alert.alert_type,
            "content change detected"
        );
        Ok(record)
    }
}

fn build_alert(record: &MonitoringRecord, title: Option<&str>) -> MonitoringAlert {
    let (alert_type, priority) = if record.is_new_post {
        (AlertType::NewPost, AlertPriority::Low)
    } else {
        (AlertType::ContentChange, AlertPriority::Medium)
    };

    let subject = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or(record.post_url.as_deref())
        .unwrap_or(&record.post_id);
    let subject: String = subject.chars().take(ALERT_TITLE_MAX_CHARS).collect();

    let (title, message) = match alert_type {
        AlertType::NewPost => (
            format!("New {} post: {subject}", record.platform),
            format!(
                "A new {} post was detected ({}).",
                record.platform, record.post_id
            ),
        ),
        AlertType::ContentChange => (
            format!("{} content changed: {subject}", record.platform),
            format!(
                "Content of {} post {} changed since the last scan.",
                record.platform, record.post_id
            ),
        ),
    };

    MonitoringAlert {
        id: None,
        competitor_id: record.competitor_id,
        alert_type,
        priority,
        title,
        message,
        metadata: AlertMetadata {
            platform: record.platform,
            post_id: record.post_id.clone(),
            post_url: record.post_url.clone(),
            content_hash: record.content_hash.clone(),
            previous_content_hash: record.previous_content_hash.clone(),
        },
        is_read: false,
        is_dismissed: false,
        created_at: record.detected_at,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use rivalwatch_core::{Competitor, CompetitorMonitoringStatus};
    use rivalwatch_db::MemoryStore;

    use super::*;

    /// Delegates to a [`MemoryStore`] but rejects the first combined write.
    struct FailFirstWrite {
        inner: MemoryStore,
        failed: AtomicBool,
    }

    #[async_trait]
    impl MonitoringStore for FailFirstWrite {
        async fn get_competitor(&self, id: i64) -> Result<Option<Competitor>, DbError> {
            self.inner.get_competitor(id).await
        }

        async fn list_due_competitors(&self, now: DateTime<Utc>) -> Result<Vec<i64>, DbError> {
            self.inner.list_due_competitors(now).await
        }

        async fn get_latest_monitoring_record(
            &self,
            competitor_id: i64,
            platform: Platform,
            post_id: &str,
        ) -> Result<Option<MonitoringRecord>, DbError> {
            self.inner
                .get_latest_monitoring_record(competitor_id, platform, post_id)
                .await
        }

        async fn save_monitoring_record(&self, record: &MonitoringRecord) -> Result<i64, DbError> {
            self.inner.save_monitoring_record(record).await
        }

        async fn create_alert(&self, alert: &MonitoringAlert) -> Result<i64, DbError> {
            self.inner.create_alert(alert).await
        }

        async fn save_record_with_alert(
            &self,
            record: &MonitoringRecord,
            alert: &MonitoringAlert,
        ) -> Result<(i64, i64), DbError> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(DbError::NotFound);
            }
            self.inner.save_record_with_alert(record, alert).await
        }

        async fn get_monitoring_status(
            &self,
            competitor_id: i64,
        ) -> Result<Option<CompetitorMonitoringStatus>, DbError> {
            self.inner.get_monitoring_status(competitor_id).await
        }

        async fn upsert_monitoring_status(
            &self,
            status: &CompetitorMonitoringStatus,
        ) -> Result<(), DbError> {
            self.inner.upsert_monitoring_status(status).await
        }

        async fn list_alerts(
            &self,
            competitor_id: i64,
            limit: i64,
        ) -> Result<Vec<MonitoringAlert>, DbError> {
            self.inner.list_alerts(competitor_id, limit).await
        }

        async fn set_alert_flags(
            &self,
            alert_id: i64,
            is_read: Option<bool>,
            is_dismissed: Option<bool>,
        ) -> Result<(), DbError> {
            self.inner
                .set_alert_flags(alert_id, is_read, is_dismissed)
                .await
        }
    }

    fn item(text: &str) -> ContentItem {
        ContentItem {
            post_id: None,
            url: "https://acme.example/pricing".to_string(),
            title: Some("Pricing".to_string()),
            text: text.to_string(),
            published_at: None,
        }
    }

    #[tokio::test]
    async fn first_sighting_is_a_new_post_with_low_alert() {
        let store = Arc::new(MemoryStore::new());
        let detector = ChangeDetector::new(store.clone());

        let record = detector
            .process_item(1, Platform::Website, &item("Hello"), Utc::now())
            .await
            .unwrap();

        assert!(record.is_new_post);
        assert!(!record.is_content_change);
        assert!(record.previous_content_hash.is_none());
        let alerts = store.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::NewPost);
        assert_eq!(alerts[0].priority, AlertPriority::Low);
        assert_eq!(alerts[0].title, "New website post: Pricing");
    }

    #[tokio::test]
    async fn identical_content_is_an_idempotent_no_op() {
        let store = Arc::new(MemoryStore::new());
        let detector = ChangeDetector::new(store.clone());

        detector
            .process_item(1, Platform::Website, &item("Hello"), Utc::now())
            .await
            .unwrap();
        let second = detector
            .process_item(1, Platform::Website, &item("Hello"), Utc::now())
            .await
            .unwrap();

        assert!(!second.is_new_post);
        assert!(!second.is_content_change);
        assert_eq!(store.records().len(), 1);
        assert_eq!(store.alerts().len(), 1);
    }

    #[tokio::test]
    async fn changed_content_links_previous_hash_with_medium_alert() {
        let store = Arc::new(MemoryStore::new());
        let detector = ChangeDetector::new(store.clone());

        detector
            .process_item(1, Platform::Website, &item("Hello"), Utc::now())
            .await
            .unwrap();
        let changed = detector
            .process_item(1, Platform::Website, &item("Hello v2"), Utc::now())
            .await
            .unwrap();

        assert!(changed.is_content_change);
        assert_eq!(
            changed.previous_content_hash.as_deref(),
            Some(content_hash("Hello").as_str())
        );
        let alerts = store.alerts();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[1].alert_type, AlertType::ContentChange);
        assert_eq!(alerts[1].priority, AlertPriority::Medium);
        assert_eq!(
            alerts[1].metadata.previous_content_hash,
            changed.previous_content_hash
        );
    }

    #[tokio::test]
    async fn identity_is_scoped_by_platform() {
        let store = Arc::new(MemoryStore::new());
        let detector = ChangeDetector::new(store.clone());

        detector
            .process_item(1, Platform::Website, &item("Hello"), Utc::now())
            .await
            .unwrap();
        let browser = detector
            .process_item(1, Platform::Browser, &item("Hello"), Utc::now())
            .await
            .unwrap();

        assert!(browser.is_new_post);
        assert_eq!(store.records().len(), 2);
    }

    #[tokio::test]
    async fn failed_write_leaves_no_record_so_the_retry_alerts() {
        let store = Arc::new(FailFirstWrite {
            inner: MemoryStore::new(),
            failed: AtomicBool::new(false),
        });
        let detector = ChangeDetector::new(store.clone());

        let first = detector
            .process_item(1, Platform::Website, &item("Hello"), Utc::now())
            .await;
        assert!(first.is_err());
        assert!(store.inner.records().is_empty());
        assert!(store.inner.alerts().is_empty());

        let retry = detector
            .process_item(1, Platform::Website, &item("Hello"), Utc::now())
            .await
            .unwrap();
        assert!(retry.is_new_post);
        assert_eq!(store.inner.records().len(), 1);
        let alerts = store.inner.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::NewPost);
    }

    #[test]
    fn alert_falls_back_to_url_when_title_missing() {
        let record = MonitoringRecord {
            competitor_id: 2,
            platform: Platform::Rss,
            post_id: "guid-1".to_string(),
            post_url: Some("https://acme.example/feed/1".to_string()),
            content_text: "x".to_string(),
            content_hash: content_hash("x"),
            previous_content_hash: None,
            is_new_post: true,
            is_content_change: false,
            detected_at: Utc::now(),
        };
        let alert = build_alert(&record, Some("  "));
        assert_eq!(alert.title, "New rss post: https://acme.example/feed/1");
        assert_eq!(alert.metadata.post_id, "guid-1");
    }
}
