//! Collection pipeline end to end: per-feed batches in, one paginated,
//! deduplicated, newest-first page out.

use crate::support::{item, items};
use herald::collector::merge::{
    dedup_by_url, filter_sources, filter_sources_keeping, merge_batches, paginate,
};
use herald::types::{DataOrigin, NewsItem};

#[test]
fn merge_pipeline_dedups_then_sorts() {
    // Two feeds racing on the same story: the first-fetched copy wins
    // even though the second batch carries a fresher timestamp.
    let yonhap = vec![
        item("https://news.test/shared", 30, "연합뉴스"),
        item("https://news.test/y1", 5, "연합뉴스"),
    ];
    let hani = vec![
        item("https://news.test/shared", 1, "한겨레"),
        item("https://news.test/h1", 10, "한겨레"),
    ];

    let merged = merge_batches(vec![yonhap, hani]);

    assert_eq!(merged.len(), 3);
    // newest first
    assert_eq!(merged[0].url, "https://news.test/y1");
    assert_eq!(merged[1].url, "https://news.test/h1");
    // duplicate resolved to the earlier batch's copy
    assert_eq!(merged[2].source, "연합뉴스");
}

#[test]
fn batch_to_page_flow() {
    let batches = vec![items(8, "연합뉴스"), items(4, "한겨레")];
    let merged = merge_batches(batches);
    // URLs collide across the two stub feeds, so the second batch
    // contributes nothing.
    assert_eq!(merged.len(), 8);

    let filtered = filter_sources(merged, &["연합뉴스".to_string()]);
    assert_eq!(filtered.len(), 8);

    let page = paginate(filtered, 5, 5, DataOrigin::RealtimeRss);
    assert_eq!(page.data.len(), 3);
    assert_eq!(page.total, 8);
    assert!(!page.has_more);
}

#[test]
fn source_filter_keeps_external_leg() {
    let mixed = vec![
        item("https://news.test/a", 1, "연합뉴스"),
        item("https://news.test/b", 2, "한겨레"),
        item("https://news.google.com/x", 3, "Google News"),
    ];

    let kept = filter_sources_keeping(mixed, &["연합뉴스".to_string()], "Google News");
    assert_eq!(kept.len(), 2);
    assert!(kept.iter().any(|i| i.source == "Google News"));
    assert!(kept.iter().all(|i| i.source != "한겨레"));
}

#[test]
fn dedup_survives_repeated_cycles() {
    let first_pass = items(5, "연합뉴스");
    let mut both = first_pass.clone();
    both.extend(items(5, "연합뉴스"));

    let unique = dedup_by_url(both);
    assert_eq!(unique.len(), 5);

    // ids are URL-derived, so a re-collected item keeps its identity
    for (a, b) in unique.iter().zip(first_pass.iter()) {
        assert_eq!(a.id, b.id);
    }
}

#[test]
fn stable_id_is_deterministic() {
    let a = NewsItem::stable_id("https://news.test/article/1");
    let b = NewsItem::stable_id("https://news.test/article/1");
    let c = NewsItem::stable_id("https://news.test/article/2");
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn page_wire_shape() {
    let page = paginate(items(3, "연합뉴스"), 2, 0, DataOrigin::DatabaseHybrid);
    let json = serde_json::to_value(&page).unwrap();

    assert_eq!(json["source"], "database-hybrid");
    assert_eq!(json["total"], 3);
    assert_eq!(json["hasMore"], true);
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
    // items serialize camelCase
    assert!(json["data"][0].get("publishedAt").is_some());
    assert!(json["data"][0].get("published_at").is_none());
}
