//! Realtime strategy: every call fans out to the live feeds.
//!
//! Nothing is persisted; staleness control lives entirely in the
//! response cache at the API boundary.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::collector::merge::{filter_sources, merge_batches};
use crate::collector::{fetch_batches, NewsCollector};
use crate::sources::rss::RssFetcher;
use crate::types::{DataOrigin, HeraldError, NewsCategory, NewsItem};

/// Items older than this no longer count as live breaking news.
const BREAKING_WINDOW_MINUTES: i64 = 30;

pub struct RealtimeCollector {
    http: Client,
}

impl RealtimeCollector {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    async fn collect_all(&self) -> Vec<NewsItem> {
        let fetchers = RssFetcher::for_all_feeds(&self.http);
        let batches = fetch_batches(&fetchers).await;
        let healthy = batches.len();
        let merged = merge_batches(batches);
        info!(
            healthy,
            feeds = fetchers.len(),
            items = merged.len(),
            "Realtime collection complete"
        );
        merged
    }

    async fn collect_category(&self, category: NewsCategory) -> Vec<NewsItem> {
        let fetchers = RssFetcher::for_category(&self.http, category);
        let batches = fetch_batches(&fetchers).await;
        let merged = merge_batches(batches);
        debug!(%category, items = merged.len(), "Realtime category collection complete");
        merged
    }
}

#[async_trait]
impl NewsCollector for RealtimeCollector {
    async fn latest(
        &self,
        limit: usize,
        sources: &[String],
    ) -> Result<Vec<NewsItem>, HeraldError> {
        let mut items = filter_sources(self.collect_all().await, sources);
        items.truncate(limit);
        Ok(items)
    }

    async fn by_category(
        &self,
        category: NewsCategory,
        sources: &[String],
    ) -> Result<Vec<NewsItem>, HeraldError> {
        Ok(filter_sources(self.collect_category(category).await, sources))
    }

    async fn breaking(
        &self,
        limit: usize,
        sources: &[String],
    ) -> Result<Vec<NewsItem>, HeraldError> {
        let items = filter_sources(
            self.collect_category(NewsCategory::Breaking).await,
            sources,
        );
        Ok(recent_breaking(items, limit))
    }

    async fn search(&self, keyword: &str) -> Result<Vec<NewsItem>, HeraldError> {
        Ok(keyword_filter(self.collect_all().await, keyword))
    }

    fn origin(&self) -> DataOrigin {
        DataOrigin::RealtimeRss
    }
}

// -- Selection helpers ------------------------------------------------------

/// Keep items inside the breaking recency window, capped. Input is
/// already sorted newest first, so truncation keeps the most recent.
pub(crate) fn recent_breaking(items: Vec<NewsItem>, limit: usize) -> Vec<NewsItem> {
    let window = chrono::Duration::minutes(BREAKING_WINDOW_MINUTES);
    let mut recent: Vec<NewsItem> = items
        .into_iter()
        .filter(|item| item.is_within(window))
        .collect();
    recent.truncate(limit);
    recent
}

/// Case-insensitive keyword match over title and summary.
pub(crate) fn keyword_filter(items: Vec<NewsItem>, keyword: &str) -> Vec<NewsItem> {
    let needle = keyword.to_lowercase();
    items
        .into_iter()
        .filter(|item| {
            item.title.to_lowercase().contains(&needle)
                || item.summary.to_lowercase().contains(&needle)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
