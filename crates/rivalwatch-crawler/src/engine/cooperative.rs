//! Cooperative isolation: every fetch gets its own freshly built
//! single-threaded scheduler on a blocking thread, which is torn down when
//! the fetch finishes. The host runtime only awaits the join handle.

use std::sync::Arc;
use std::time::Duration;

use rivalwatch_core::{CrawlResult, ExtractionConfig};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::crawl_with_context;
use crate::context::FetchContext;
use crate::error::CrawlError;
use crate::settings::{EngineSettings, FetchSettings};

/// Leftover tasks on a disposable scheduler get this long before the
/// scheduler is dropped.
const SCHEDULER_SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

pub(super) async fn crawl_cooperative(
    urls: &[String],
    config: &ExtractionConfig,
    settings: &EngineSettings,
    context: Arc<dyn FetchContext>,
) -> Vec<CrawlResult> {
    let semaphore = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));
    let mut set = JoinSet::new();

    for url in urls {
        let url = url.clone();
        let config = config.clone();
        let fetch_settings = settings.fetch.clone();
        let context = Arc::clone(&context);
        let semaphore = Arc::clone(&semaphore);

        set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return CrawlResult::error(url, "crawl semaphore closed");
            };

            let task_url = url.clone();
            let isolated = tokio::task::spawn_blocking(move || {
                run_on_disposable_scheduler(&task_url, &config, &fetch_settings, context.as_ref())
            })
            .await;

            isolated.unwrap_or_else(|e| {
                tracing::error!(url, error = %e, "isolated fetch aborted");
                CrawlResult::error(url, format!("isolated fetch aborted: {e}"))
            })
        });
    }

    let mut results = Vec::with_capacity(urls.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            // The engine fills the missing URL with an error result.
            Err(e) => tracing::error!(error = %e, "crawl task failed to join"),
        }
    }
    results
}

fn run_on_disposable_scheduler(
    url: &str,
    config: &ExtractionConfig,
    settings: &FetchSettings,
    context: &dyn FetchContext,
) -> CrawlResult {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            return CrawlResult::error(url, CrawlError::Runtime(e).to_string());
        }
    };

    let result = runtime.block_on(crawl_with_context(url, config, settings, context));
    runtime.shutdown_timeout(SCHEDULER_SHUTDOWN_GRACE);
    result
}
