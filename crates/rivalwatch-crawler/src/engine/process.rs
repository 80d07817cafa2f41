//! Process isolation: URLs are dispatched to worker processes, one URL or one
//! contiguous batch per process, with at most `worker_pool_size` processes
//! alive at a time.

use std::sync::Arc;

use rivalwatch_core::{CrawlResult, ExtractionConfig, ProcessMode};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::complete_results;
use crate::settings::EngineSettings;
use crate::worker::{WorkerLauncher, WorkerRequest};

/// Up to this many URLs, adaptive mode spends one process per URL.
pub const ADAPTIVE_INDIVIDUAL_MAX: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Individual,
    Batched,
}

#[must_use]
pub fn select_dispatch(url_count: usize, mode: ProcessMode) -> Dispatch {
    match mode {
        ProcessMode::Individual => Dispatch::Individual,
        ProcessMode::Batched => Dispatch::Batched,
        ProcessMode::Adaptive if url_count <= ADAPTIVE_INDIVIDUAL_MAX => Dispatch::Individual,
        ProcessMode::Adaptive => Dispatch::Batched,
    }
}

pub(super) async fn crawl_in_processes(
    urls: &[String],
    config: &ExtractionConfig,
    settings: &EngineSettings,
    launcher: Arc<dyn WorkerLauncher>,
    mode: ProcessMode,
) -> Vec<CrawlResult> {
    let dispatch = select_dispatch(urls.len(), mode);
    let units: Vec<Vec<String>> = match dispatch {
        Dispatch::Individual => urls.iter().map(|url| vec![url.clone()]).collect(),
        Dispatch::Batched => urls
            .chunks(settings.batch_size.max(1))
            .map(<[String]>::to_vec)
            .collect(),
    };
    tracing::debug!(?dispatch, units = units.len(), "dispatching to worker pool");

    let pool = Arc::new(Semaphore::new(settings.worker_pool_size.max(1)));
    let mut set = JoinSet::new();

    for unit in units {
        let request = WorkerRequest {
            urls: unit.clone(),
            extraction: config.clone(),
            settings: settings.fetch.clone(),
        };
        let launcher = Arc::clone(&launcher);
        let pool = Arc::clone(&pool);

        set.spawn(async move {
            let Ok(_slot) = pool.acquire_owned().await else {
                return fail_unit(&unit, "worker pool closed");
            };

            match launcher.run(request).await {
                Ok(response) => complete_results(
                    &unit,
                    response.results,
                    "worker returned no result for this URL",
                ),
                Err(e) => {
                    tracing::warn!(urls = ?unit, error = %e, "worker unit failed");
                    fail_unit(&unit, &format!("worker unit failed: {e}"))
                }
            }
        });
    }

    let mut results = Vec::with_capacity(urls.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(unit_results) => results.extend(unit_results),
            // The engine fills the unit's URLs with error results.
            Err(e) => tracing::error!(error = %e, "worker unit task failed to join"),
        }
    }
    results
}

fn fail_unit(unit: &[String], message: &str) -> Vec<CrawlResult> {
    unit.iter()
        .map(|url| CrawlResult::error(url.clone(), message))
        .collect()
}
