//! Dual-mode news aggregation.
//!
//! One strategy trait, two implementations, selected once at startup:
//! [`DatabaseCollector`] serves persisted rows kept fresh by a
//! background ingest cycle, [`RealtimeCollector`] fans out to the live
//! feeds on every call. Route handlers hold the chosen strategy as a
//! trait object and never branch on the mode again.

pub mod database;
pub mod merge;
pub mod realtime;

pub use database::{CycleReport, DatabaseCollector, NewsIngestor};
pub use realtime::RealtimeCollector;

use async_trait::async_trait;
use tracing::warn;

use crate::sources::rss::RssFetcher;
use crate::sources::NewsSource;
use crate::types::{DataOrigin, HeraldError, NewsCategory, NewsItem};

/// A collection strategy: one fixed way of producing news sets.
///
/// Result sets come back merged and sorted newest-first. The capped
/// scopes (`latest`, `breaking`) are already cut to size; the open
/// scopes (`by_category`, `search`) return the full filtered set so
/// the API boundary can paginate with a correct `total`.
#[async_trait]
pub trait NewsCollector: Send + Sync {
    /// Newest items across every category, filtered to `sources`
    /// (empty keeps all), capped to `limit`.
    async fn latest(
        &self,
        limit: usize,
        sources: &[String],
    ) -> Result<Vec<NewsItem>, HeraldError>;

    /// Full merged set for one category, filtered to `sources`.
    async fn by_category(
        &self,
        category: NewsCategory,
        sources: &[String],
    ) -> Result<Vec<NewsItem>, HeraldError>;

    /// Most recent breaking items, filtered to `sources`, capped.
    async fn breaking(
        &self,
        limit: usize,
        sources: &[String],
    ) -> Result<Vec<NewsItem>, HeraldError>;

    /// Full keyword result set over title and summary.
    async fn search(&self, keyword: &str) -> Result<Vec<NewsItem>, HeraldError>;

    /// The layer tag responses carry when this strategy serves them.
    fn origin(&self) -> DataOrigin;
}

/// Fan out to the given fetchers concurrently. Sources fail
/// independently: an error is logged and contributes nothing while the
/// siblings' batches still come back in fetcher order.
pub(crate) async fn fetch_batches(fetchers: &[RssFetcher]) -> Vec<Vec<NewsItem>> {
    let results = futures::future::join_all(fetchers.iter().map(|f| f.fetch())).await;

    fetchers
        .iter()
        .zip(results)
        .filter_map(|(fetcher, result)| match result {
            Ok(items) => Some(items),
            Err(e) => {
                warn!(source = fetcher.name(), error = %e, "Source fetch failed, skipping");
                None
            }
        })
        .collect()
}
