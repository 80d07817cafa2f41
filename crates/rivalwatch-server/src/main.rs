mod scheduler;

use std::sync::Arc;

use rivalwatch_db::{MonitoringStore, PgStore};
use rivalwatch_monitor::Monitor;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // The process strategy re-executes this binary as a crawl worker.
    if std::env::args().nth(1).as_deref() == Some(rivalwatch_crawler::WORKER_ARG) {
        init_tracing("warn")?;
        rivalwatch_crawler::run_worker_stdio().await?;
        return Ok(());
    }

    let config = Arc::new(rivalwatch_core::load_app_config()?);
    init_tracing(&config.log_level)?;

    let pool = rivalwatch_db::connect_pool_from_config(&config).await?;
    let applied = rivalwatch_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let store: Arc<dyn MonitoringStore> = Arc::new(PgStore::new(pool));
    let monitor = Arc::new(Monitor::from_app_config(&config, store)?);
    tracing::info!(
        strategy = %config.crawl_strategy,
        cron = %config.scheduler_cron,
        max_concurrent_scans = config.max_concurrent_scans,
        "rivalwatch server starting"
    );

    let mut scheduler =
        scheduler::build_scheduler(Arc::clone(&monitor), &config.scheduler_cron).await?;

    shutdown_signal().await?;
    scheduler.shutdown().await?;
    Ok(())
}

/// Logs go to stderr; worker stdout carries the protocol response.
fn init_tracing(default_level: &str) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    tracing::info!("received shutdown signal, stopping scheduler");
    Ok(())
}
