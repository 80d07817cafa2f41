//! Content collectors for platforms the crawl engine does not fetch.

mod feed;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rivalwatch_core::{Competitor, ContentItem, Platform};

use crate::error::CollectorError;

pub use feed::{FeedCollector, YOUTUBE_FEED_BASE};

/// Returns the competitor's current content on one platform.
#[async_trait]
pub trait PlatformCollector: Send + Sync {
    /// # Errors
    ///
    /// Returns [`CollectorError`] when the platform cannot be read. The
    /// orchestrator records the error against this platform only.
    async fn collect(
        &self,
        competitor: &Competitor,
        platform: Platform,
    ) -> Result<Vec<ContentItem>, CollectorError>;
}

#[derive(Clone, Default)]
pub struct CollectorRegistry {
    collectors: HashMap<Platform, Arc<dyn PlatformCollector>>,
}

impl CollectorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the feed collector serving `rss` and `youtube`.
    #[must_use]
    pub fn with_feeds(feeds: FeedCollector) -> Self {
        let feeds: Arc<dyn PlatformCollector> = Arc::new(feeds);
        let mut registry = Self::new();
        registry.register(Platform::Rss, Arc::clone(&feeds));
        registry.register(Platform::Youtube, feeds);
        registry
    }

    /// Register `collector` for `platform`, replacing any previous one.
    pub fn register(&mut self, platform: Platform, collector: Arc<dyn PlatformCollector>) {
        self.collectors.insert(platform, collector);
    }

    #[must_use]
    pub fn get(&self, platform: Platform) -> Option<Arc<dyn PlatformCollector>> {
        self.collectors.get(&platform).cloned()
    }

    /// Collect with the registered collector, or fail with
    /// [`CollectorError::NoCollector`].
    ///
    /// # Errors
    ///
    /// Propagates the collector's error.
    pub async fn collect(
        &self,
        competitor: &Competitor,
        platform: Platform,
    ) -> Result<Vec<ContentItem>, CollectorError> {
        let collector = self
            .get(platform)
            .ok_or(CollectorError::NoCollector(platform))?;
        collector.collect(competitor, platform).await
    }
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut platforms: Vec<_> = self.collectors.keys().collect();
        platforms.sort();
        f.debug_struct("CollectorRegistry")
            .field("platforms", &platforms)
            .finish()
    }
}
