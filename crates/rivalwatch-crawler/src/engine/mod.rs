//! The crawl execution engine: fetches a set of URLs under an isolation
//! strategy and always yields exactly one [`CrawlResult`] per input URL.

mod cooperative;
mod process;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rivalwatch_core::{CrawlResult, ExtractionConfig, InputFormat, IsolationStrategy};

use crate::context::{FetchContext, HttpContext};
use crate::error::CrawlError;
use crate::extract::{ExtractionAdapter, ExtractionOutcome};
use crate::fetch::PageFetcher;
use crate::normalize::{normalize_body, truncate_chars};
use crate::settings::{EngineSettings, FetchSettings};
use crate::worker::{ProcessLauncher, WorkerLauncher};

pub use process::{select_dispatch, Dispatch};

pub struct CrawlEngine {
    settings: EngineSettings,
    context: Arc<dyn FetchContext>,
    launcher: Arc<dyn WorkerLauncher>,
}

impl CrawlEngine {
    #[must_use]
    pub fn new(
        settings: EngineSettings,
        context: Arc<dyn FetchContext>,
        launcher: Arc<dyn WorkerLauncher>,
    ) -> Self {
        Self {
            settings,
            context,
            launcher,
        }
    }

    /// Production wiring: real HTTP in both strategies, worker processes
    /// spawned from `worker_bin` or the current executable.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Io`] if the current executable cannot be
    /// resolved and no worker binary is configured.
    pub fn from_settings(settings: EngineSettings) -> Result<Self, CrawlError> {
        let launcher = ProcessLauncher::from_settings(&settings)?;
        Ok(Self::new(settings, Arc::new(HttpContext), Arc::new(launcher)))
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Crawl every URL under `strategy`.
    ///
    /// Never fails: fetch, extraction, and isolation-unit failures are
    /// reported per URL. The returned vector has one entry per input URL.
    pub async fn crawl_batch(
        &self,
        urls: &[String],
        config: &ExtractionConfig,
        strategy: IsolationStrategy,
    ) -> Vec<CrawlResult> {
        if urls.is_empty() {
            return Vec::new();
        }

        let config = self.settings.resolve_extraction(config);
        tracing::info!(url_count = urls.len(), %strategy, "crawling batch");

        let results = match strategy {
            IsolationStrategy::Cooperative => {
                cooperative::crawl_cooperative(
                    urls,
                    &config,
                    &self.settings,
                    Arc::clone(&self.context),
                )
                .await
            }
            IsolationStrategy::Process(mode) => {
                process::crawl_in_processes(
                    urls,
                    &config,
                    &self.settings,
                    Arc::clone(&self.launcher),
                    mode,
                )
                .await
            }
        };

        let results = complete_results(urls, results, "crawl produced no result for this URL");
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        tracing::info!(
            url_count = urls.len(),
            succeeded,
            failed = urls.len() - succeeded,
            "batch crawl finished"
        );
        results
    }
}

/// Fetch, normalize, and extract one URL with the given collaborators.
pub async fn crawl_url(
    url: &str,
    config: &ExtractionConfig,
    settings: &FetchSettings,
    fetcher: &dyn PageFetcher,
    extractor: &dyn ExtractionAdapter,
) -> CrawlResult {
    let fetch = tokio::time::timeout(
        Duration::from_secs(settings.timeout_secs),
        fetcher.fetch(url),
    )
    .await;

    let page = match fetch {
        Ok(Ok(page)) => page,
        Ok(Err(e)) if e.is_target_failure() => {
            tracing::warn!(url, error = %e, "fetch returned an unusable response");
            return CrawlResult::failed(url, e.to_string());
        }
        Ok(Err(e)) => {
            tracing::warn!(url, error = %e, "fetch failed");
            return CrawlResult::error(url, e.to_string());
        }
        Err(_) => {
            let e = CrawlError::Timeout {
                url: url.to_string(),
                secs: settings.timeout_secs,
            };
            tracing::warn!(url, error = %e, "fetch timed out");
            return CrawlResult::error(url, e.to_string());
        }
    };

    let normalized = normalize_body(
        &page.body,
        page.content_type.as_deref(),
        settings.content_max_chars,
    );
    if normalized.text.is_empty() {
        return CrawlResult::failed(url, "page has no readable text");
    }

    let outcome = if config.enabled {
        let input = match config.input_format() {
            InputFormat::Markdown => normalized.text.clone(),
            InputFormat::Html => truncate_chars(&page.body, settings.content_max_chars),
            InputFormat::Text => strip_markdown(&normalized.text),
        };
        extractor.extract(&input, config).await
    } else {
        ExtractionOutcome::passthrough()
    };
    if !outcome.ok {
        tracing::debug!(url, "extraction unavailable; storing raw content only");
    }

    tracing::debug!(url, chars = normalized.text.chars().count(), "fetched");
    CrawlResult::success(url, normalized.title, normalized.text, outcome.fields)
}

/// Build collaborators from `context` and crawl one URL. A context that
/// cannot build a fetcher yields an `error` result; one that cannot build an
/// extractor degrades to raw content.
pub async fn crawl_with_context(
    url: &str,
    config: &ExtractionConfig,
    settings: &FetchSettings,
    context: &dyn FetchContext,
) -> CrawlResult {
    let fetcher = match context.fetcher(settings) {
        Ok(fetcher) => fetcher,
        Err(e) => return CrawlResult::error(url, format!("failed to build fetcher: {e}")),
    };
    let extractor: Arc<dyn ExtractionAdapter> = match context.extractor(settings) {
        Ok(extractor) => extractor,
        Err(e) => {
            tracing::warn!(url, error = %e, "failed to build extractor");
            Arc::new(UnavailableExtractor)
        }
    };
    crawl_url(url, config, settings, fetcher.as_ref(), extractor.as_ref()).await
}

/// Stands in when the real extractor cannot be built.
pub(crate) struct UnavailableExtractor;

#[async_trait]
impl ExtractionAdapter for UnavailableExtractor {
    async fn extract(&self, _content: &str, config: &ExtractionConfig) -> ExtractionOutcome {
        if config.enabled {
            ExtractionOutcome::failed()
        } else {
            ExtractionOutcome::passthrough()
        }
    }
}

fn strip_markdown(text: &str) -> String {
    text.lines()
        .map(|line| {
            line.trim_start_matches('#')
                .trim_start_matches("- ")
                .trim_start()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pair every expected URL with one result, filling gaps with `error`
/// results. Duplicate URLs each consume their own result; extras are dropped.
pub(crate) fn complete_results(
    expected: &[String],
    results: Vec<CrawlResult>,
    missing_message: &str,
) -> Vec<CrawlResult> {
    let mut by_url: HashMap<String, VecDeque<CrawlResult>> = HashMap::new();
    for result in results {
        by_url
            .entry(result.url.clone())
            .or_default()
            .push_back(result);
    }

    expected
        .iter()
        .map(|url| {
            by_url
                .get_mut(url)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| CrawlResult::error(url.clone(), missing_message))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivalwatch_core::CrawlStatus;

    #[test]
    fn complete_results_fills_gaps_and_keeps_duplicates() {
        let expected = vec![
            "https://a.example".to_string(),
            "https://b.example".to_string(),
            "https://a.example".to_string(),
        ];
        let results = vec![
            CrawlResult::success(
                "https://a.example",
                None,
                "A".to_string(),
                serde_json::Map::new(),
            ),
            CrawlResult::success(
                "https://unrelated.example",
                None,
                "X".to_string(),
                serde_json::Map::new(),
            ),
        ];

        let completed = complete_results(&expected, results, "missing");
        assert_eq!(completed.len(), 3);
        assert_eq!(completed[0].status, CrawlStatus::Success);
        assert_eq!(completed[1].status, CrawlStatus::Error);
        assert_eq!(completed[1].error.as_deref(), Some("missing"));
        assert_eq!(completed[2].url, "https://a.example");
        assert_eq!(completed[2].status, CrawlStatus::Error);
    }

    #[test]
    fn strip_markdown_removes_heading_and_list_markers() {
        assert_eq!(strip_markdown("# Title\n- item\nplain"), "Title\nitem\nplain");
    }
}
