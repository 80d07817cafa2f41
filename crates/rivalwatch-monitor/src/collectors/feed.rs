//! RSS/Atom collection for `rss` handles (a feed URL) and `youtube` handles
//! (a channel id, read through the channel's public upload feed).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rivalwatch_core::{Competitor, ContentItem, Platform};
use rivalwatch_crawler::normalize::html_to_text;
use rivalwatch_crawler::FetchSettings;

use super::PlatformCollector;
use crate::error::CollectorError;

pub const YOUTUBE_FEED_BASE: &str = "https://www.youtube.com/feeds/videos.xml";

/// Newest entries kept per feed.
const FEED_MAX_ITEMS: usize = 20;

pub struct FeedCollector {
    client: Client,
    youtube_feed_base: String,
}

impl FeedCollector {
    /// # Errors
    ///
    /// Returns [`CollectorError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: &FetchSettings) -> Result<Self, CollectorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            youtube_feed_base: YOUTUBE_FEED_BASE.to_string(),
        })
    }

    /// Point `youtube` collection at a different feed endpoint.
    #[must_use]
    pub fn with_youtube_feed_base(mut self, base: impl Into<String>) -> Self {
        self.youtube_feed_base = base.into();
        self
    }

    fn feed_url(&self, platform: Platform, handle: &str) -> String {
        let handle = handle.trim();
        if platform == Platform::Youtube && !handle.starts_with("http") {
            format!("{}?channel_id={handle}", self.youtube_feed_base)
        } else {
            handle.to_string()
        }
    }

    async fn fetch_feed(&self, url: &str) -> Result<Vec<ContentItem>, CollectorError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CollectorError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        let feed = feed_rs::parser::parse(&bytes[..]).map_err(|e| CollectorError::Parse {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let mut items: Vec<ContentItem> = feed.entries.into_iter().filter_map(entry_item).collect();
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        items.truncate(FEED_MAX_ITEMS);
        Ok(items)
    }
}

#[async_trait]
impl PlatformCollector for FeedCollector {
    async fn collect(
        &self,
        competitor: &Competitor,
        platform: Platform,
    ) -> Result<Vec<ContentItem>, CollectorError> {
        let handle = competitor
            .handle(platform)
            .ok_or(CollectorError::MissingHandle(platform))?;
        let url = self.feed_url(platform, handle);

        let items = self.fetch_feed(&url).await?;
        tracing::debug!(
            competitor_id = competitor.id,
            %platform,
            url,
            items = items.len(),
            "feed collected"
        );
        Ok(items)
    }
}

fn entry_item(entry: feed_rs::model::Entry) -> Option<ContentItem> {
    let url = entry
        .links
        .first()
        .map(|link| link.href.clone())
        .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;

    let title = entry
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty());

    let body = entry
        .content
        .and_then(|c| c.body)
        .or_else(|| entry.summary.map(|s| s.content))
        .or_else(|| {
            entry
                .media
                .into_iter()
                .find_map(|m| m.description.map(|d| d.content))
        })
        .map(|raw| {
            if raw.contains('<') {
                html_to_text(&raw)
            } else {
                raw.trim().to_string()
            }
        })
        .filter(|b| !b.is_empty());

    let text = match (&title, body) {
        (Some(title), Some(body)) => format!("{title}\n\n{body}"),
        (Some(title), None) => title.clone(),
        (None, Some(body)) => body,
        (None, None) => return None,
    };

    Some(ContentItem {
        post_id: Some(entry.id).filter(|id| !id.trim().is_empty()),
        url,
        title,
        text,
        published_at: entry.published.or(entry.updated),
    })
}
