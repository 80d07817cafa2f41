//! Background job scheduler.
//!
//! Registers the recurring due-scan sweep. Competitors become due when their
//! `next_scheduled_scan` passes, so the sweep interval only bounds how late a
//! scan can start.

use std::sync::Arc;

use chrono::Utc;
use rivalwatch_monitor::Monitor;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, the
/// cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    monitor: Arc<Monitor>,
    cron: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_due_scan_job(&scheduler, monitor, cron).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_due_scan_job(
    scheduler: &JobScheduler,
    monitor: Arc<Monitor>,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let sweep_gate = Arc::new(Mutex::new(()));

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let monitor = Arc::clone(&monitor);
        let sweep_gate = Arc::clone(&sweep_gate);

        Box::pin(async move {
            run_sweep(&monitor, &sweep_gate).await;
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: registered due-scan job");
    Ok(())
}

/// One sweep at a time; a tick that fires while the previous sweep is still
/// running is dropped. Returns whether the sweep ran.
async fn run_sweep(monitor: &Monitor, sweep_gate: &Mutex<()>) -> bool {
    let Ok(_running) = sweep_gate.try_lock() else {
        tracing::info!("scheduler: previous due-scan sweep still running; skipping tick");
        return false;
    };

    tracing::debug!("scheduler: starting due-scan sweep");
    if let Err(e) = monitor.run_due_scans(Utc::now()).await {
        tracing::error!(error = %e, "scheduler: due-scan sweep failed");
    }
    true
}
