//! Shared fixtures: deterministic news items, stub collectors, and a
//! fully wired [`ServiceState`] that never touches the network.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use herald::ai::NewsSummarizer;
use herald::cache::TtlCache;
use herald::collector::NewsCollector;
use herald::config::{AiConfig, ProviderConfig, ServiceMode};
use herald::markets::{KrxClient, YahooQuotesClient};
use herald::search::HybridSearch;
use herald::server::routes::{AppState, ServiceState, SnapshotSlot};
use herald::sources::article::ArticleScraper;
use herald::types::{DataOrigin, HeraldError, NewsCategory, NewsItem};

/// A news item published `minutes_ago`, with a URL-derived stable id.
pub fn item(url: &str, minutes_ago: i64, source: &str) -> NewsItem {
    NewsItem {
        id: NewsItem::stable_id(url),
        title: format!("기사 {url}"),
        url: url.to_string(),
        summary: "요약문".to_string(),
        source: source.to_string(),
        category: NewsCategory::Economy,
        published_at: Utc::now() - ChronoDuration::minutes(minutes_ago),
        image_url: None,
        is_breaking: false,
        ai_summary: None,
        ai_keywords: None,
        ai_summarized_at: None,
        ai_provider: None,
    }
}

pub fn items(n: usize, source: &str) -> Vec<NewsItem> {
    (0..n)
        .map(|i| item(&format!("https://stub.test/{i}"), i as i64, source))
        .collect()
}

/// Collector serving a fixed item list, or failing on demand.
pub struct StubCollector {
    items: Vec<NewsItem>,
    origin: DataOrigin,
    fail: bool,
}

impl StubCollector {
    pub fn serving(origin: DataOrigin, items: Vec<NewsItem>) -> Arc<Self> {
        Arc::new(StubCollector {
            items,
            origin,
            fail: false,
        })
    }

    pub fn failing(origin: DataOrigin) -> Arc<Self> {
        Arc::new(StubCollector {
            items: Vec::new(),
            origin,
            fail: true,
        })
    }

    fn result(&self, limit: usize) -> Result<Vec<NewsItem>, HeraldError> {
        if self.fail {
            return Err(HeraldError::source_fetch("stub", "feed down"));
        }
        Ok(self.items.iter().take(limit).cloned().collect())
    }
}

#[async_trait]
impl NewsCollector for StubCollector {
    async fn latest(&self, limit: usize, _sources: &[String]) -> Result<Vec<NewsItem>, HeraldError> {
        self.result(limit)
    }

    async fn by_category(
        &self,
        _category: NewsCategory,
        _sources: &[String],
    ) -> Result<Vec<NewsItem>, HeraldError> {
        self.result(usize::MAX)
    }

    async fn breaking(
        &self,
        limit: usize,
        _sources: &[String],
    ) -> Result<Vec<NewsItem>, HeraldError> {
        self.result(limit)
    }

    async fn search(&self, _keyword: &str) -> Result<Vec<NewsItem>, HeraldError> {
        self.result(usize::MAX)
    }

    fn origin(&self) -> DataOrigin {
        self.origin
    }
}

/// Hybrid search stub that skips the external leg.
pub struct PassthroughSearch;

#[async_trait]
impl HybridSearch for PassthroughSearch {
    async fn keyword_search(&self, _keyword: &str, local: Vec<NewsItem>) -> Vec<NewsItem> {
        local
    }

    async fn category_search(
        &self,
        _category: NewsCategory,
        local: Vec<NewsItem>,
    ) -> Vec<NewsItem> {
        local
    }
}

fn provider_config(model: &str) -> ProviderConfig {
    ProviderConfig {
        model: model.to_string(),
        api_key_env: "HERALD_IT_UNSET_KEY".to_string(),
    }
}

fn ai_config() -> AiConfig {
    AiConfig {
        providers: Vec::new(),
        temperature: 0.3,
        max_tokens: 1024,
        groq: provider_config("llama-3.3-70b-versatile"),
        gemini: provider_config("gemini-2.0-flash"),
        openrouter: provider_config("qwen/qwen3-30b-a3b:free"),
    }
}

/// Service state wired entirely from stubs. Market clients are real but
/// never called unless a test hits an unprimed market endpoint.
pub fn state(
    collector: Arc<dyn NewsCollector>,
    fallback: Option<Arc<dyn NewsCollector>>,
) -> AppState {
    let scraper = Arc::new(ArticleScraper::new(Duration::from_secs(2), 3000, 100).unwrap());
    let summarizer = Arc::new(NewsSummarizer::new(
        Vec::new(),
        None,
        scraper,
        None,
        ai_config(),
        100,
    ));
    Arc::new(ServiceState {
        mode: ServiceMode::Realtime,
        cache: Arc::new(TtlCache::new()),
        collector,
        fallback,
        searcher: Arc::new(PassthroughSearch),
        store: None,
        summarizer,
        krx: KrxClient::new(Duration::from_secs(2)).unwrap(),
        quotes: YahooQuotesClient::new(Duration::from_secs(2)).unwrap(),
        trending: SnapshotSlot::new(),
        economy: SnapshotSlot::new(),
        started_at: tokio::time::Instant::now(),
    })
}
