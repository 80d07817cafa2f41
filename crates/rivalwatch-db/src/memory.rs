//! In-process [`MonitoringStore`] used by tests and dry runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rivalwatch_core::{
    Competitor, CompetitorMonitoringStatus, CompetitorStatus, MonitoringAlert, MonitoringRecord,
    Platform,
};

use crate::{DbError, MonitoringStore};

#[derive(Debug, Default)]
struct State {
    competitors: BTreeMap<i64, Competitor>,
    records: Vec<MonitoringRecord>,
    alerts: Vec<MonitoringAlert>,
    statuses: HashMap<i64, CompetitorMonitoringStatus>,
}

impl State {
    fn push_record(&mut self, record: &MonitoringRecord) -> i64 {
        self.records.push(record.clone());
        i64::try_from(self.records.len()).unwrap_or(i64::MAX)
    }

    fn push_alert(&mut self, alert: &MonitoringAlert) -> i64 {
        let id = i64::try_from(self.alerts.len() + 1).unwrap_or(i64::MAX);
        let mut stored = alert.clone();
        stored.id = Some(id);
        self.alerts.push(stored);
        id
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_competitors(competitors: impl IntoIterator<Item = Competitor>) -> Self {
        let store = Self::new();
        for competitor in competitors {
            store.insert_competitor(competitor);
        }
        store
    }

    /// Insert or replace a competitor by id.
    pub fn insert_competitor(&self, competitor: Competitor) {
        self.lock().competitors.insert(competitor.id, competitor);
    }

    /// Every record written so far, in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<MonitoringRecord> {
        self.lock().records.clone()
    }

    /// Every alert written so far, in insertion order.
    #[must_use]
    pub fn alerts(&self) -> Vec<MonitoringAlert> {
        self.lock().alerts.clone()
    }

    // A panic while holding the lock cannot leave `State` half-updated: every
    // mutation is a push or insert that cannot fail midway.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MonitoringStore for MemoryStore {
    async fn get_competitor(&self, id: i64) -> Result<Option<Competitor>, DbError> {
        Ok(self.lock().competitors.get(&id).cloned())
    }

    async fn list_due_competitors(&self, now: DateTime<Utc>) -> Result<Vec<i64>, DbError> {
        let state = self.lock();
        let mut due: Vec<(Option<DateTime<Utc>>, i64)> = state
            .competitors
            .values()
            .filter(|c| c.status == CompetitorStatus::Active)
            .filter_map(|c| {
                let next = state
                    .statuses
                    .get(&c.id)
                    .and_then(|s| s.next_scheduled_scan);
                match next {
                    Some(at) if at > now => None,
                    _ => Some((next, c.id)),
                }
            })
            .collect();
        due.sort();
        Ok(due.into_iter().map(|(_, id)| id).collect())
    }

    async fn get_latest_monitoring_record(
        &self,
        competitor_id: i64,
        platform: Platform,
        post_id: &str,
    ) -> Result<Option<MonitoringRecord>, DbError> {
        let state = self.lock();
        // Later insertions win ties on `detected_at`.
        let latest = state
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| {
                r.competitor_id == competitor_id && r.platform == platform && r.post_id == post_id
            })
            .max_by_key(|(idx, r)| (r.detected_at, *idx))
            .map(|(_, r)| r.clone());
        Ok(latest)
    }

    async fn save_monitoring_record(&self, record: &MonitoringRecord) -> Result<i64, DbError> {
        Ok(self.lock().push_record(record))
    }

    async fn create_alert(&self, alert: &MonitoringAlert) -> Result<i64, DbError> {
        Ok(self.lock().push_alert(alert))
    }

    async fn save_record_with_alert(
        &self,
        record: &MonitoringRecord,
        alert: &MonitoringAlert,
    ) -> Result<(i64, i64), DbError> {
        let mut state = self.lock();
        let record_id = state.push_record(record);
        let alert_id = state.push_alert(alert);
        Ok((record_id, alert_id))
    }

    async fn get_monitoring_status(
        &self,
        competitor_id: i64,
    ) -> Result<Option<CompetitorMonitoringStatus>, DbError> {
        Ok(self.lock().statuses.get(&competitor_id).cloned())
    }

    async fn upsert_monitoring_status(
        &self,
        status: &CompetitorMonitoringStatus,
    ) -> Result<(), DbError> {
        let mut state = self.lock();
        let finished_at = status.last_successful_scan.max(status.last_failed_scan);
        if let (false, Some(at), Some(competitor)) = (
            status.is_scanning,
            finished_at,
            state.competitors.get_mut(&status.competitor_id),
        ) {
            competitor.last_scan_at = competitor.last_scan_at.max(Some(at));
        }
        state
            .statuses
            .insert(status.competitor_id, status.clone());
        Ok(())
    }

    async fn list_alerts(
        &self,
        competitor_id: i64,
        limit: i64,
    ) -> Result<Vec<MonitoringAlert>, DbError> {
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let state = self.lock();
        let mut alerts: Vec<MonitoringAlert> = state
            .alerts
            .iter()
            .rev()
            .filter(|a| a.competitor_id == competitor_id)
            .cloned()
            .collect();
        // Stable sort keeps newer insertions first among equal timestamps.
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        alerts.truncate(limit);
        Ok(alerts)
    }

    async fn set_alert_flags(
        &self,
        alert_id: i64,
        is_read: Option<bool>,
        is_dismissed: Option<bool>,
    ) -> Result<(), DbError> {
        let mut state = self.lock();
        let alert = state
            .alerts
            .iter_mut()
            .find(|a| a.id == Some(alert_id))
            .ok_or(DbError::NotFound)?;
        if let Some(read) = is_read {
            alert.is_read = read;
        }
        if let Some(dismissed) = is_dismissed {
            alert.is_dismissed = dismissed;
        }
        Ok(())
    }
}
