//! Per-competitor scan state machine.
//!
//! ```text
//! Idle ──begin──▶ Scanning ──succeed──▶ Succeeded
//!                     │                    │
//!                     └──────fail──▶ Failed ◀┘ (next run begins again)
//! ```
//!
//! Every transition is a pure function from the current status to the next
//! one; the orchestrator persists the result.

use chrono::{DateTime, Duration, Utc};
use rivalwatch_core::CompetitorMonitoringStatus;

use crate::error::MonitorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Scanning,
    Succeeded,
    Failed,
}

/// The phase a persisted status row is in.
#[must_use]
pub fn phase(status: &CompetitorMonitoringStatus) -> ScanPhase {
    if status.is_scanning {
        return ScanPhase::Scanning;
    }
    match (status.last_successful_scan, status.last_failed_scan) {
        (None, None) => ScanPhase::Idle,
        (Some(_), None) => ScanPhase::Succeeded,
        (None, Some(_)) => ScanPhase::Failed,
        (Some(ok), Some(failed)) if ok >= failed => ScanPhase::Succeeded,
        (Some(_), Some(_)) => ScanPhase::Failed,
    }
}

/// Whether a scanning status has held its lock longer than `stale_after`.
#[must_use]
pub fn is_stale(
    status: &CompetitorMonitoringStatus,
    now: DateTime<Utc>,
    stale_after: Duration,
) -> bool {
    status.is_scanning
        && status
            .scan_started_at
            .is_none_or(|started| now - started >= stale_after)
}

/// Enter `Scanning`.
///
/// # Errors
///
/// Returns [`MonitorError::AlreadyScanning`] when a scan holds the lock and
/// the lock is not stale. The status is left untouched.
pub fn begin(
    status: &CompetitorMonitoringStatus,
    now: DateTime<Utc>,
    stale_after: Duration,
) -> Result<CompetitorMonitoringStatus, MonitorError> {
    if status.is_scanning {
        if !is_stale(status, now, stale_after) {
            return Err(MonitorError::AlreadyScanning(status.competitor_id));
        }
        tracing::warn!(
            competitor_id = status.competitor_id,
            scan_started_at = ?status.scan_started_at,
            "recovering abandoned scan lock"
        );
    }

    Ok(CompetitorMonitoringStatus {
        is_scanning: true,
        scan_started_at: Some(now),
        ..status.clone()
    })
}

/// Leave `Scanning` for `Succeeded`.
#[must_use]
pub fn succeed(
    status: &CompetitorMonitoringStatus,
    now: DateTime<Utc>,
    frequency: Duration,
) -> CompetitorMonitoringStatus {
    CompetitorMonitoringStatus {
        is_scanning: false,
        last_successful_scan: Some(now),
        consecutive_failures: 0,
        scan_error_message: None,
        next_scheduled_scan: Some(now + frequency),
        ..status.clone()
    }
}

/// Leave `Scanning` for `Failed`, pushing the next run out by the backoff.
#[must_use]
pub fn fail(
    status: &CompetitorMonitoringStatus,
    now: DateTime<Utc>,
    frequency: Duration,
    max_backoff: Duration,
    message: impl Into<String>,
) -> CompetitorMonitoringStatus {
    let failures = status.consecutive_failures.saturating_add(1);
    CompetitorMonitoringStatus {
        is_scanning: false,
        last_failed_scan: Some(now),
        consecutive_failures: failures,
        scan_error_message: Some(message.into()),
        next_scheduled_scan: Some(now + backoff(frequency, failures, max_backoff)),
        ..status.clone()
    }
}

/// Retry delay after `failures` consecutive failures: `base * 2^(failures-1)`,
/// capped at `cap`.
#[must_use]
pub fn backoff(base: Duration, failures: u32, cap: Duration) -> Duration {
    let exponent = failures.saturating_sub(1).min(30);
    base.checked_mul(1_i32 << exponent).unwrap_or(cap).min(cap)
}
