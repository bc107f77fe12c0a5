//! Router-level tests: real routes, stub collectors, no network.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use tower::ServiceExt;

use crate::support::{items, state, StubCollector};
use herald::collector::NewsCollector;
use herald::server::build_router;
use herald::types::{ChangeType, DataOrigin, TrendingStockItem, TrendingStocksData};
use std::sync::Arc;

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let resp = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_json(
    app: Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_reports_service_and_mode() {
    let app = build_router(state(
        StubCollector::serving(DataOrigin::RealtimeRss, items(1, "연합뉴스")),
        None,
    ));
    let (status, json) = get_json(app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["service"], "herald");
    assert_eq!(json["status"], "ok");
    assert_eq!(json["mode"], "realtime");
}

#[tokio::test]
async fn latest_second_hit_replays_from_cache() {
    let app = build_router(state(
        StubCollector::serving(DataOrigin::RealtimeRss, items(3, "연합뉴스")),
        None,
    ));

    let (status, json) = get_json(app.clone(), "/api/news/latest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["source"], "realtime-rss");
    assert_eq!(json["data"].as_array().unwrap().len(), 3);

    let (_, json) = get_json(app, "/api/news/latest").await;
    assert_eq!(json["source"], "cache");
}

#[tokio::test]
async fn latest_uses_fallback_collector_when_primary_fails() {
    let primary = StubCollector::failing(DataOrigin::Database);
    let fallback = StubCollector::serving(DataOrigin::RealtimeRss, items(2, "한겨레"));
    let app = build_router(state(primary, Some(fallback as Arc<dyn NewsCollector>)));

    let (status, json) = get_json(app, "/api/news/latest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["source"], "realtime-rss");
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn latest_degrades_to_empty_payload_not_error() {
    let app = build_router(state(StubCollector::failing(DataOrigin::RealtimeRss), None));
    let (status, json) = get_json(app, "/api/news/latest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert!(json["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn topic_envelope_paginates_and_tags_origin() {
    let app = build_router(state(
        StubCollector::serving(DataOrigin::Database, items(5, "연합뉴스")),
        None,
    ));
    let (status, json) = get_json(app, "/api/news/topics/economy?limit=2&offset=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["category"], "economy");
    assert_eq!(json["source"], "database-hybrid");
    assert_eq!(json["total"], 5);
    assert_eq!(json["hasMore"], true);
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn topic_rejects_unknown_category() {
    let app = build_router(state(
        StubCollector::serving(DataOrigin::RealtimeRss, vec![]),
        None,
    ));
    let (status, json) = get_json(app, "/api/news/topics/sports-ball").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn search_requires_a_keyword() {
    let app = build_router(state(
        StubCollector::serving(DataOrigin::RealtimeRss, vec![]),
        None,
    ));
    let (status, json) = get_json(app, "/api/news/search?q=%20%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "검색 키워드를 입력해주세요.");
}

#[tokio::test]
async fn search_pages_through_results() {
    let app = build_router(state(
        StubCollector::serving(DataOrigin::RealtimeRss, items(7, "연합뉴스")),
        None,
    ));
    // percent-encoded "금리"
    let (status, json) =
        get_json(app, "/api/news/search?q=%EA%B8%88%EB%A6%AC&limit=3&page=3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["keyword"], "금리");
    assert_eq!(json["page"], 3);
    assert_eq!(json["total"], 7);
    assert_eq!(json["totalPages"], 3);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn summarize_rejects_empty_body() {
    let app = build_router(state(
        StubCollector::serving(DataOrigin::RealtimeRss, vec![]),
        None,
    ));
    let (status, json) = post_json(app, "/api/news/summarize", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid newsId");
}

#[tokio::test]
async fn trending_serves_primed_snapshot_with_age() {
    let state = state(
        StubCollector::serving(DataOrigin::RealtimeRss, vec![]),
        None,
    );
    let row = TrendingStockItem {
        rank: 1,
        code: "005930".to_string(),
        name: "삼성전자".to_string(),
        price: "71,200".to_string(),
        change: "+1,300".to_string(),
        change_percent: "+1.86".to_string(),
        change_type: ChangeType::Up,
        volume: "12,345,678".to_string(),
    };
    state
        .trending
        .store(TrendingStocksData {
            by_volume: vec![row.clone()],
            gainers: vec![row.clone()],
            losers: vec![row],
            last_updated: Utc::now(),
        })
        .await;

    let (status, json) = get_json(build_router(state), "/api/markets/trending").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cached"], true);
    assert!(json["cacheAge"].is_u64());
    assert_eq!(json["data"]["volume"][0]["name"], "삼성전자");
}
