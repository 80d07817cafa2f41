use std::sync::Arc;

use crate::error::CrawlError;
use crate::extract::{ExtractionAdapter, LlmExtractor};
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::settings::FetchSettings;

/// Builds the fetcher and extractor for one isolation context.
///
/// Called inside the context (a disposable scheduler or a worker process),
/// so connection pools and timers are bound to that context and die with it.
pub trait FetchContext: Send + Sync {
    /// # Errors
    ///
    /// Returns [`CrawlError`] if the fetcher cannot be constructed.
    fn fetcher(&self, settings: &FetchSettings) -> Result<Arc<dyn PageFetcher>, CrawlError>;

    /// # Errors
    ///
    /// Returns [`CrawlError`] if the extractor cannot be constructed.
    fn extractor(&self, settings: &FetchSettings)
        -> Result<Arc<dyn ExtractionAdapter>, CrawlError>;
}

/// Real HTTP fetching and LLM extraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpContext;

impl FetchContext for HttpContext {
    fn fetcher(&self, settings: &FetchSettings) -> Result<Arc<dyn PageFetcher>, CrawlError> {
        Ok(Arc::new(HttpFetcher::new(settings)?))
    }

    fn extractor(
        &self,
        settings: &FetchSettings,
    ) -> Result<Arc<dyn ExtractionAdapter>, CrawlError> {
        Ok(Arc::new(LlmExtractor::new(settings)?))
    }
}
