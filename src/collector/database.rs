//! Database strategy: serve persisted rows, refreshed by an ingest
//! cycle.
//!
//! Reads come straight from the store; category reads are additionally
//! enriched with live external results through the hybrid searcher.
//! Storage errors surface to the API boundary, which owns the fallback
//! ordering.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};

use crate::collector::merge::{filter_sources, merge_batches};
use crate::collector::{fetch_batches, NewsCollector};
use crate::search::HybridSearch;
use crate::sources::rss::RssFetcher;
use crate::storage::NewsStore;
use crate::types::{DataOrigin, HeraldError, NewsCategory, NewsItem};

/// Rows a category read pulls before enrichment and pagination.
const CATEGORY_READ_LIMIT: i64 = 100;
/// Upper bound on local rows fed into a keyword search.
const SEARCH_READ_LIMIT: i64 = 1000;

pub struct DatabaseCollector {
    store: Arc<NewsStore>,
    enricher: Arc<dyn HybridSearch>,
}

impl DatabaseCollector {
    pub fn new(store: Arc<NewsStore>, enricher: Arc<dyn HybridSearch>) -> Self {
        Self { store, enricher }
    }
}

#[async_trait]
impl NewsCollector for DatabaseCollector {
    async fn latest(
        &self,
        limit: usize,
        sources: &[String],
    ) -> Result<Vec<NewsItem>, HeraldError> {
        self.store.latest(limit as i64, 0, sources).await
    }

    async fn by_category(
        &self,
        category: NewsCategory,
        sources: &[String],
    ) -> Result<Vec<NewsItem>, HeraldError> {
        let local = self
            .store
            .by_category(category, CATEGORY_READ_LIMIT, 0)
            .await?;
        // Filter before enrichment: external results are exempt from
        // the user's source selection.
        let local = filter_sources(local, sources);
        Ok(self.enricher.category_search(category, local).await)
    }

    async fn breaking(
        &self,
        limit: usize,
        sources: &[String],
    ) -> Result<Vec<NewsItem>, HeraldError> {
        let items = self.store.breaking(limit as i64).await?;
        Ok(filter_sources(items, sources))
    }

    async fn search(&self, keyword: &str) -> Result<Vec<NewsItem>, HeraldError> {
        let (items, _) = self.store.search(keyword, SEARCH_READ_LIMIT, 0).await?;
        Ok(items)
    }

    fn origin(&self) -> DataOrigin {
        DataOrigin::Database
    }
}

// ---------------------------------------------------------------------------
// Ingest cycle
// ---------------------------------------------------------------------------

/// What one ingest cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub fetched: usize,
    pub saved: usize,
    pub pruned: u64,
    pub elapsed: Duration,
}

/// Feeds the store: fan out to every enabled feed, merge, upsert,
/// prune past the retention window.
pub struct NewsIngestor {
    http: Client,
    store: Arc<NewsStore>,
    retention_days: i64,
}

impl NewsIngestor {
    pub fn new(http: Client, store: Arc<NewsStore>, retention_days: u32) -> Self {
        Self {
            http,
            store,
            retention_days: i64::from(retention_days),
        }
    }

    /// One full collection cycle. Individual feed and prune failures
    /// degrade; the cycle itself always completes with a report.
    pub async fn collect_once(&self) -> CycleReport {
        let started = Instant::now();

        let fetchers = RssFetcher::for_all_feeds(&self.http);
        let batches = fetch_batches(&fetchers).await;
        let items = merge_batches(batches);
        let fetched = items.len();

        let saved = self.store.save_batch(&items).await;

        let pruned = match self.store.prune_older_than(self.retention_days).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "Prune failed, continuing");
                0
            }
        };

        let report = CycleReport {
            fetched,
            saved,
            pruned,
            elapsed: started.elapsed(),
        };
        info!(
            fetched = report.fetched,
            saved = report.saved,
            pruned = report.pruned,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Collection cycle complete"
        );
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
