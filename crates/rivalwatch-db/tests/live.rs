//! Live integration tests for rivalwatch-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/rivalwatch-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use rivalwatch_core::{
    content_hash, AlertMetadata, AlertPriority, AlertType, CompetitorConfig, CompetitorStatus,
    CompetitorMonitoringStatus, MonitoringAlert, MonitoringRecord, Platform,
};
use rivalwatch_db::{seed_competitors, DbError, MonitoringStore, PgStore};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn acme_config() -> CompetitorConfig {
    let mut handles = BTreeMap::new();
    handles.insert(Platform::Youtube, "UC123".to_string());
    CompetitorConfig {
        name: "Acme".to_string(),
        website_url: Some("https://acme.example".to_string()),
        handles,
        platforms: vec![Platform::Website, Platform::Youtube],
        scan_frequency_minutes: 60,
        status: CompetitorStatus::Active,
    }
}

async fn seeded_acme_id(pool: &sqlx::PgPool) -> i64 {
    seed_competitors(pool, &[acme_config()])
        .await
        .expect("seed_competitors failed");
    sqlx::query_scalar::<_, i64>("SELECT id FROM competitors WHERE name = 'Acme'")
        .fetch_one(pool)
        .await
        .expect("seeded competitor missing")
}

fn record(competitor_id: i64, text: &str, previous: Option<&str>) -> MonitoringRecord {
    MonitoringRecord {
        competitor_id,
        platform: Platform::Website,
        post_id: "url-0123456789abcdef".to_string(),
        post_url: Some("https://acme.example".to_string()),
        content_text: text.to_string(),
        content_hash: content_hash(text),
        previous_content_hash: previous.map(content_hash),
        is_new_post: previous.is_none(),
        is_content_change: previous.is_some(),
        detected_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Competitors
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn seeding_is_idempotent_by_name(pool: sqlx::PgPool) {
    let first = seed_competitors(&pool, &[acme_config()]).await.unwrap();
    let second = seed_competitors(&pool, &[acme_config()]).await.unwrap();
    assert_eq!(first, 1);
    assert_eq!(second, 1);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM competitors")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn seeded_competitor_reads_back_typed(pool: sqlx::PgPool) {
    let id = seeded_acme_id(&pool).await;
    let store = PgStore::new(pool);

    let competitor = store.get_competitor(id).await.unwrap().unwrap();
    assert_eq!(competitor.name, "Acme");
    assert_eq!(
        competitor.platforms,
        vec![Platform::Website, Platform::Youtube]
    );
    assert_eq!(competitor.handle(Platform::Youtube), Some("UC123"));
    assert!(store.get_competitor(id + 1000).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn due_competitors_respect_schedule(pool: sqlx::PgPool) {
    let id = seeded_acme_id(&pool).await;
    let store = PgStore::new(pool);
    let now = Utc::now();

    assert_eq!(store.list_due_competitors(now).await.unwrap(), vec![id]);

    let mut status = CompetitorMonitoringStatus::idle(id);
    status.last_successful_scan = Some(now);
    status.next_scheduled_scan = Some(now + Duration::minutes(60));
    store.upsert_monitoring_status(&status).await.unwrap();

    assert!(store.list_due_competitors(now).await.unwrap().is_empty());
    assert_eq!(
        store
            .list_due_competitors(now + Duration::minutes(61))
            .await
            .unwrap(),
        vec![id]
    );

    let competitor = store.get_competitor(id).await.unwrap().unwrap();
    assert!(competitor.last_scan_at.is_some());
}

// ---------------------------------------------------------------------------
// Records and alerts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn latest_record_is_the_newest_append(pool: sqlx::PgPool) {
    let id = seeded_acme_id(&pool).await;
    let store = PgStore::new(pool);

    store
        .save_monitoring_record(&record(id, "Hello", None))
        .await
        .unwrap();
    store
        .save_monitoring_record(&record(id, "Hello v2", Some("Hello")))
        .await
        .unwrap();

    let latest = store
        .get_latest_monitoring_record(id, Platform::Website, "url-0123456789abcdef")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.content_hash, content_hash("Hello v2"));
    assert_eq!(
        latest.previous_content_hash.as_deref(),
        Some(content_hash("Hello").as_str())
    );
}

fn alert_for(competitor_id: i64, text: &str) -> MonitoringAlert {
    MonitoringAlert {
        id: None,
        competitor_id,
        alert_type: AlertType::NewPost,
        priority: AlertPriority::Low,
        title: "New website post: Acme".to_string(),
        message: "A new website post was detected.".to_string(),
        metadata: AlertMetadata {
            platform: Platform::Website,
            post_id: "url-0123456789abcdef".to_string(),
            post_url: Some("https://acme.example".to_string()),
            content_hash: content_hash(text),
            previous_content_hash: None,
        },
        is_read: false,
        is_dismissed: false,
        created_at: Utc::now(),
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn record_and_alert_commit_together(pool: sqlx::PgPool) {
    let id = seeded_acme_id(&pool).await;
    let store = PgStore::new(pool);

    let (record_id, alert_id) = store
        .save_record_with_alert(&record(id, "Hello", None), &alert_for(id, "Hello"))
        .await
        .unwrap();
    assert!(record_id > 0);
    assert!(store
        .get_latest_monitoring_record(id, Platform::Website, "url-0123456789abcdef")
        .await
        .unwrap()
        .is_some());
    let alerts = store.list_alerts(id, 10).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].id, Some(alert_id));
}

#[sqlx::test(migrations = "../../migrations")]
async fn failed_alert_insert_rolls_back_the_record(pool: sqlx::PgPool) {
    let id = seeded_acme_id(&pool).await;
    let store = PgStore::new(pool.clone());

    // The alert references a competitor that does not exist.
    let result = store
        .save_record_with_alert(&record(id, "Hello", None), &alert_for(id + 1000, "Hello"))
        .await;
    assert!(matches!(result, Err(DbError::Sqlx(_))));

    let records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM monitoring_records")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(records, 0);
    assert!(store.list_alerts(id, 10).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn alert_flags_are_the_only_mutation(pool: sqlx::PgPool) {
    let id = seeded_acme_id(&pool).await;
    let store = PgStore::new(pool);

    let alert = MonitoringAlert {
        id: None,
        competitor_id: id,
        alert_type: AlertType::NewPost,
        priority: AlertPriority::Low,
        title: "Acme published new website content".to_string(),
        message: "New content detected at https://acme.example".to_string(),
        metadata: AlertMetadata {
            platform: Platform::Website,
            post_id: "url-0123456789abcdef".to_string(),
            post_url: Some("https://acme.example".to_string()),
            content_hash: content_hash("Hello"),
            previous_content_hash: None,
        },
        is_read: false,
        is_dismissed: false,
        created_at: Utc::now(),
    };
    let alert_id = store.create_alert(&alert).await.unwrap();

    store
        .set_alert_flags(alert_id, Some(true), None)
        .await
        .unwrap();
    let listed = store.list_alerts(id, 10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, Some(alert_id));
    assert!(listed[0].is_read);
    assert!(!listed[0].is_dismissed);
    assert_eq!(listed[0].metadata, alert.metadata);

    let err = store
        .set_alert_flags(alert_id + 1, None, Some(true))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}

#[sqlx::test(migrations = "../../migrations")]
async fn status_round_trips(pool: sqlx::PgPool) {
    let id = seeded_acme_id(&pool).await;
    let store = PgStore::new(pool);
    assert!(store.get_monitoring_status(id).await.unwrap().is_none());

    let mut status = CompetitorMonitoringStatus::idle(id);
    status.is_scanning = true;
    status.scan_started_at = Some(Utc::now());
    store.upsert_monitoring_status(&status).await.unwrap();

    status.is_scanning = false;
    status.consecutive_failures = 3;
    status.scan_error_message = Some("all platforms failed".to_string());
    store.upsert_monitoring_status(&status).await.unwrap();

    let stored = store.get_monitoring_status(id).await.unwrap().unwrap();
    assert!(!stored.is_scanning);
    assert_eq!(stored.consecutive_failures, 3);
    assert_eq!(
        stored.scan_error_message.as_deref(),
        Some("all platforms failed")
    );
}
