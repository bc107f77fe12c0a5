//! Merge pipeline shared by both collection strategies.
//!
//! The order is fixed: concatenate per-source batches in fetch order,
//! drop duplicate URLs keeping the first occurrence, then sort newest
//! first. Deduplication runs before the sort so a URL collision is won
//! by the earliest-fetched copy, not an arbitrary one. Source filters
//! apply before pagination so `total` describes the filtered set.

use std::collections::HashSet;

use crate::types::{DataOrigin, NewsItem, Page};

/// Deduplicate by exact URL; the first occurrence wins.
pub fn dedup_by_url(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.url.clone()))
        .collect()
}

/// Sort by publication time, newest first. Stable, so items sharing a
/// timestamp keep their fetch order.
pub fn sort_newest_first(items: &mut [NewsItem]) {
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}

/// Concatenate per-source batches, dedup by URL, sort newest first.
pub fn merge_batches(batches: Vec<Vec<NewsItem>>) -> Vec<NewsItem> {
    let combined: Vec<NewsItem> = batches.into_iter().flatten().collect();
    let mut unique = dedup_by_url(combined);
    sort_newest_first(&mut unique);
    unique
}

/// Keep only items from the given source names. An empty filter keeps
/// everything.
pub fn filter_sources(items: Vec<NewsItem>, sources: &[String]) -> Vec<NewsItem> {
    if sources.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| sources.iter().any(|s| s == &item.source))
        .collect()
}

/// Like [`filter_sources`], but items from `passthrough` always stay:
/// live external search results are never dropped by a user's source
/// selection.
pub fn filter_sources_keeping(
    items: Vec<NewsItem>,
    sources: &[String],
    passthrough: &str,
) -> Vec<NewsItem> {
    if sources.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| item.source == passthrough || sources.iter().any(|s| s == &item.source))
        .collect()
}

/// Slice one page out of an already filtered, sorted set.
pub fn paginate(items: Vec<NewsItem>, limit: usize, offset: usize, origin: DataOrigin) -> Page {
    let total = items.len();
    let data: Vec<NewsItem> = items.into_iter().skip(offset).take(limit).collect();
    Page {
        data,
        total,
        has_more: offset + limit < total,
        origin,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
