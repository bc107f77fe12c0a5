//! Hybrid search: live Google News results merged over a local set.
//!
//! The external leg is best-effort. A failed or timed-out Google News
//! query degrades to the local results alone, logged at warn, never
//! surfaced as an error. When the same URL appears on both sides the
//! external copy wins: external results are concatenated first and
//! URL dedup keeps first occurrences. This tie-break is deliberately
//! the opposite of the collector merge, where fetch order wins.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::collector::merge::{dedup_by_url, sort_newest_first};
use crate::sources::google_news::GoogleNewsClient;
use crate::types::{NewsCategory, NewsItem};

/// Capability to merge live external search results over a local set.
///
/// Collector and route layers depend on this trait so tests can swap
/// in deterministic stubs for the live Google News client.
#[async_trait]
pub trait HybridSearch: Send + Sync {
    /// Keyword search: live external results merged over `local`.
    async fn keyword_search(&self, keyword: &str, local: Vec<NewsItem>) -> Vec<NewsItem>;

    /// Category enrichment: live external results for the category's
    /// keyword expression merged over `local`.
    async fn category_search(&self, category: NewsCategory, local: Vec<NewsItem>)
        -> Vec<NewsItem>;
}

/// Production [`HybridSearch`] backed by Google News RSS.
pub struct HybridSearcher {
    google: GoogleNewsClient,
}

impl HybridSearcher {
    pub fn new(google: GoogleNewsClient) -> Self {
        Self { google }
    }
}

#[async_trait]
impl HybridSearch for HybridSearcher {
    async fn keyword_search(&self, keyword: &str, local: Vec<NewsItem>) -> Vec<NewsItem> {
        let external = match self.google.search_keyword(keyword).await {
            Ok(items) => items,
            Err(e) => {
                warn!(keyword, error = %e, "External search failed, serving local only");
                Vec::new()
            }
        };

        let merged = merge_external_first(external, local);
        debug!(keyword, total = merged.len(), "Hybrid keyword search complete");
        merged
    }

    async fn category_search(
        &self,
        category: NewsCategory,
        local: Vec<NewsItem>,
    ) -> Vec<NewsItem> {
        let external = match self.google.search_category(category).await {
            Ok(items) => items,
            Err(e) => {
                warn!(%category, error = %e, "External category search failed, serving local only");
                Vec::new()
            }
        };

        let merged = merge_external_first(external, local);
        debug!(%category, total = merged.len(), "Hybrid category search complete");
        merged
    }
}

/// External results first, then local; dedup by URL (first wins, so
/// external beats local on ties); newest first.
pub(crate) fn merge_external_first(
    external: Vec<NewsItem>,
    local: Vec<NewsItem>,
) -> Vec<NewsItem> {
    let mut combined = external;
    combined.extend(local);
    let mut unique = dedup_by_url(combined);
    sort_newest_first(&mut unique);
    unique
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
