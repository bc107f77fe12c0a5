//! API route handlers and response envelopes.
//!
//! Read endpoints share one degradation ladder: response cache, then the
//! mode's collector, then the realtime fallback (database deployments),
//! then a stale cache entry, then an empty payload. Each layer only runs
//! when the one above it failed, and every response tags the layer that
//! served it so clients can tell fresh data from degraded data.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::ai::NewsSummarizer;
use crate::cache::TtlCache;
use crate::collector::NewsCollector;
use crate::config::ServiceMode;
use crate::markets::{KrxClient, YahooQuotesClient};
use crate::search::HybridSearch;
use crate::storage::NewsStore;
use crate::types::{
    DataOrigin, EconomySnapshot, HeraldError, NewsCategory, NewsItem, Page, StreamEvent,
    TrendingStocksData,
};

// ---------------------------------------------------------------------------
// Tuning
// ---------------------------------------------------------------------------

/// Response cache TTL per endpoint family.
const TTL_LATEST: Duration = Duration::from_secs(180);
const TTL_TOPIC: Duration = Duration::from_secs(300);
const TTL_BREAKING: Duration = Duration::from_secs(300);
const TTL_SEARCH: Duration = Duration::from_secs(120);

/// Market snapshots older than this trigger a refresh.
const SNAPSHOT_TTL: Duration = Duration::from_secs(180);

const LATEST_LIMIT: usize = 30;
const BREAKING_LIMIT: usize = 10;
const DEFAULT_TOPIC_LIMIT: usize = 20;
const DEFAULT_SEARCH_LIMIT: usize = 30;

/// Items from the external search leg pass the source filter
/// unconditionally; the filter only knows registry source names.
const GOOGLE_NEWS_SOURCE: &str = "Google News";

/// Error note attached when a market endpoint serves a stale snapshot
/// because the refresh failed.
const STALE_SNAPSHOT_NOTE: &str = "Fresh data unavailable, using cached data";

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Everything the handlers need, assembled once at startup.
pub struct ServiceState {
    pub mode: ServiceMode,
    pub cache: Arc<TtlCache>,
    /// Collector for the configured mode.
    pub collector: Arc<dyn NewsCollector>,
    /// Realtime collector used when the primary fails. Only set in
    /// database mode; realtime mode has nothing further to fall to.
    pub fallback: Option<Arc<dyn NewsCollector>>,
    pub searcher: Arc<dyn HybridSearch>,
    /// Persisted rows for summary lookups, database mode only.
    pub store: Option<Arc<NewsStore>>,
    pub summarizer: Arc<NewsSummarizer>,
    pub krx: KrxClient,
    pub quotes: YahooQuotesClient,
    pub trending: SnapshotSlot<TrendingStocksData>,
    pub economy: SnapshotSlot<EconomySnapshot>,
    pub started_at: Instant,
}

pub type AppState = Arc<ServiceState>;

/// Last good snapshot of one market payload plus its fetch instant.
///
/// Unlike [`TtlCache`] entries, a snapshot never leaves the slot once
/// stored; staleness only decides whether a refresh runs first.
pub struct SnapshotSlot<T> {
    slot: RwLock<Option<(T, Instant)>>,
}

impl<T: Clone> SnapshotSlot<T> {
    pub fn new() -> Self {
        SnapshotSlot {
            slot: RwLock::new(None),
        }
    }

    /// The held snapshot and its age, when younger than `max_age`.
    pub async fn fresh(&self, max_age: Duration) -> Option<(T, Duration)> {
        let slot = self.slot.read().await;
        let (value, stored_at) = slot.as_ref()?;
        let age = stored_at.elapsed();
        if age < max_age {
            Some((value.clone(), age))
        } else {
            None
        }
    }

    /// The held snapshot regardless of age.
    pub async fn any(&self) -> Option<T> {
        let slot = self.slot.read().await;
        slot.as_ref().map(|(value, _)| value.clone())
    }

    pub async fn store(&self, value: T) {
        *self.slot.write().await = Some((value, Instant::now()));
    }
}

impl<T: Clone> Default for SnapshotSlot<T> {
    fn default() -> Self {
        SnapshotSlot::new()
    }
}

// ---------------------------------------------------------------------------
// Request parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Comma-separated source names; absent keeps every source.
    pub sources: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopicParams {
    pub sources: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub sources: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SnapshotParams {
    /// `force=true` bypasses the freshness window.
    pub force: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeBody {
    pub news_id: Option<String>,
    /// Direct article context for ids the store does not know,
    /// realtime deployments mainly.
    pub url: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
}

// ---------------------------------------------------------------------------
// Response envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub source: DataOrigin,
    pub data: Vec<NewsItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicResponse {
    pub success: bool,
    pub category: String,
    pub source: DataOrigin,
    pub data: Vec<NewsItem>,
    pub total: usize,
    pub has_more: bool,
}

/// Search payload, cached whole so a cache hit replays the exact page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBody {
    pub keyword: String,
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
    pub data: Vec<NewsItem>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    #[serde(flatten)]
    pub body: SearchBody,
}

#[derive(Debug, Serialize)]
pub struct SummaryData {
    pub summary: String,
    pub keywords: Vec<String>,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub success: bool,
    pub data: SummaryData,
}

/// Replay envelope the stream endpoint returns instead of opening a
/// stream when a persisted summary already exists.
#[derive(Debug, Serialize)]
pub struct StreamCachedResponse {
    pub success: bool,
    pub cached: bool,
    pub data: SummaryData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse<T> {
    pub success: bool,
    pub data: T,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_age: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub mode: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

// ---------------------------------------------------------------------------
// News handlers
// ---------------------------------------------------------------------------

/// GET /api/news/latest
pub async fn latest_news(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<ListResponse> {
    let sources = split_sources(params.sources.as_deref());
    let key = suffixed_key("news:latest", params.sources.as_deref());

    if let Some(data) = state.cache.get::<Vec<NewsItem>>(&key).await {
        return Json(ListResponse {
            success: true,
            source: DataOrigin::Cache,
            data,
        });
    }

    let (source, data) = serve_list(&state, ListKind::Latest, &key, TTL_LATEST, &sources).await;
    Json(ListResponse {
        success: true,
        source,
        data,
    })
}

/// GET /api/news/breaking
pub async fn breaking_news(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<ListResponse> {
    let sources = split_sources(params.sources.as_deref());
    let key = suffixed_key("news:breaking", params.sources.as_deref());

    if let Some(data) = state.cache.get::<Vec<NewsItem>>(&key).await {
        return Json(ListResponse {
            success: true,
            source: DataOrigin::Cache,
            data,
        });
    }

    let (source, data) = serve_list(&state, ListKind::Breaking, &key, TTL_BREAKING, &sources).await;
    Json(ListResponse {
        success: true,
        source,
        data,
    })
}

/// GET /api/news/topics/:category
pub async fn topic_news(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(params): Query<TopicParams>,
) -> Response {
    let Ok(parsed) = category.parse::<NewsCategory>() else {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Unknown category: {category}"),
        );
    };

    let limit = params.limit.unwrap_or(DEFAULT_TOPIC_LIMIT).max(1);
    let offset = params.offset.unwrap_or(0);
    let sources = split_sources(params.sources.as_deref());
    let key = topic_key(parsed, params.sources.as_deref(), limit, offset);

    if let Some(page) = state.cache.get::<Page>(&key).await {
        return topic_response(parsed, DataOrigin::Cache, page).into_response();
    }

    let page = serve_topic(&state, parsed, &sources, limit, offset, &key).await;
    let origin = page.origin;
    topic_response(parsed, origin, page).into_response()
}

fn topic_response(category: NewsCategory, source: DataOrigin, page: Page) -> Json<TopicResponse> {
    Json(TopicResponse {
        success: true,
        category: category.to_string(),
        source,
        data: page.data,
        total: page.total,
        has_more: page.has_more,
    })
}

/// GET /api/news/search
pub async fn search_news(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let keyword = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty());
    let Some(keyword) = keyword else {
        return error_response(StatusCode::BAD_REQUEST, "검색 키워드를 입력해주세요.");
    };

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).max(1);
    let sources = split_sources(params.sources.as_deref());
    let key = search_key(keyword, params.sources.as_deref(), page, limit);

    if let Some(body) = state.cache.get::<SearchBody>(&key).await {
        return Json(SearchResponse {
            success: true,
            body,
        })
        .into_response();
    }

    let local = match state.collector.search(keyword).await {
        Ok(items) => items,
        Err(e) => {
            // Degrade to the external leg instead of failing the request.
            warn!(keyword, error = %e, "Collector search failed");
            Vec::new()
        }
    };

    // The external merge costs a live fetch, so only the first page pays it.
    let merged = if page == 1 {
        state.searcher.keyword_search(keyword, local).await
    } else {
        local
    };
    let results = filter_search_sources(merged, &sources);

    let total = results.len();
    let total_pages = total.div_ceil(limit);
    let skip = (page - 1) * limit;
    let data: Vec<NewsItem> = results.into_iter().skip(skip).take(limit).collect();

    let body = SearchBody {
        keyword: keyword.to_string(),
        page,
        total_pages,
        total,
        data,
    };
    state.cache.set(&key, &body, TTL_SEARCH).await;
    info!(keyword, total, page, "Search served");
    Json(SearchResponse {
        success: true,
        body,
    })
    .into_response()
}

// ---------------------------------------------------------------------------
// Summarization handlers
// ---------------------------------------------------------------------------

/// POST /api/news/summarize
pub async fn summarize_news(
    State(state): State<AppState>,
    Json(body): Json<SummarizeBody>,
) -> Response {
    let id = trimmed(body.news_id.as_deref());
    let url_param = trimmed(body.url.as_deref());
    if id.is_none() && url_param.is_none() {
        return error_response(StatusCode::BAD_REQUEST, "Invalid newsId");
    }

    let mut row: Option<NewsItem> = None;
    if let (Some(store), Some(id)) = (&state.store, id) {
        match store.find_by_id(id).await {
            Ok(Some(item)) => row = Some(item),
            // The store is authoritative here; unknown ids do not fall
            // through to the request body.
            Ok(None) => return error_response(StatusCode::NOT_FOUND, "News not found"),
            Err(e) => return herald_error_response(&e),
        }
    }

    if let Some(news) = &row {
        if news.has_ai_summary() {
            debug!(id = %news.id, "Serving persisted summary");
            return Json(SummaryResponse {
                success: true,
                data: SummaryData {
                    cached: Some(true),
                    ..persisted_summary(news)
                },
            })
            .into_response();
        }
    }

    let (title, url, rss_summary, persist_id) = summary_inputs(&row, &body);
    match state
        .summarizer
        .summarize(persist_id.as_deref(), &title, &url, &rss_summary)
        .await
    {
        Ok(done) => Json(SummaryResponse {
            success: true,
            data: SummaryData {
                summary: done.result.summary,
                keywords: done.result.keywords,
                provider: done.provider,
                cached: Some(false),
            },
        })
        .into_response(),
        Err(HeraldError::ContentTooShort { .. }) => {
            error_response(StatusCode::BAD_REQUEST, "Failed to fetch article content")
        }
        Err(e) => herald_error_response(&e),
    }
}

/// POST /api/news/summarize/stream
pub async fn summarize_news_stream(
    State(state): State<AppState>,
    Json(body): Json<SummarizeBody>,
) -> Response {
    let id = trimmed(body.news_id.as_deref());
    let url_param = trimmed(body.url.as_deref());
    if id.is_none() && url_param.is_none() {
        return error_response(StatusCode::BAD_REQUEST, "Invalid newsId");
    }

    // Unlike the one-shot route an unknown id is not fatal: the body may
    // carry enough context to stream without a stored row.
    let mut row: Option<NewsItem> = None;
    if let (Some(store), Some(id)) = (&state.store, id) {
        match store.find_by_id(id).await {
            Ok(found) => row = found,
            Err(e) => return herald_error_response(&e),
        }
    }

    if let Some(news) = &row {
        if news.has_ai_summary() {
            debug!(id = %news.id, "Serving persisted summary instead of streaming");
            return Json(StreamCachedResponse {
                success: true,
                cached: true,
                data: persisted_summary(news),
            })
            .into_response();
        }
    }

    let (title, url, rss_summary, persist_id) = summary_inputs(&row, &body);
    match state
        .summarizer
        .summarize_stream(persist_id, title, url, rss_summary)
        .await
    {
        Ok(rx) => sse_response(rx),
        Err(HeraldError::ContentTooShort { .. }) => error_response(
            StatusCode::BAD_REQUEST,
            "기사 내용을 가져올 수 없습니다. 잠시 후 다시 시도해주세요.",
        ),
        Err(e) => herald_error_response(&e),
    }
}

/// Stored row fields win over request body fields; the id is only kept
/// for persistence when a row actually backs it.
fn summary_inputs(
    row: &Option<NewsItem>,
    body: &SummarizeBody,
) -> (String, String, String, Option<String>) {
    let title = row
        .as_ref()
        .map(|n| n.title.clone())
        .or_else(|| body.title.clone())
        .unwrap_or_default();
    let url = row
        .as_ref()
        .map(|n| n.url.clone())
        .or_else(|| body.url.clone())
        .unwrap_or_default();
    let rss_summary = row
        .as_ref()
        .map(|n| n.summary.clone())
        .or_else(|| body.summary.clone())
        .unwrap_or_default();
    let persist_id = row.as_ref().map(|n| n.id.clone());
    (title, url, rss_summary, persist_id)
}

fn persisted_summary(news: &NewsItem) -> SummaryData {
    SummaryData {
        summary: news.ai_summary.clone().unwrap_or_default(),
        keywords: news.ai_keywords.clone().unwrap_or_default(),
        provider: news
            .ai_provider
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        cached: None,
    }
}

/// Frame summarizer events as `data: {json}\n\n` on an open stream.
/// The channel closes after the terminal event, which ends the stream.
fn sse_response(rx: mpsc::UnboundedReceiver<StreamEvent>) -> Response {
    let events = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let frame = serde_json::to_string(&event).unwrap_or_default();
        Some((Ok::<Event, Infallible>(Event::default().data(frame)), rx))
    });

    let mut response = Sse::new(events).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-transform"),
    );
    // Proxies must not buffer the stream.
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

// ---------------------------------------------------------------------------
// Market handlers
// ---------------------------------------------------------------------------

/// GET /api/markets/trending
pub async fn trending_stocks(
    State(state): State<AppState>,
    Query(params): Query<SnapshotParams>,
) -> Response {
    if !force_refresh(&params) {
        if let Some((data, age)) = state.trending.fresh(SNAPSHOT_TTL).await {
            return snapshot_response(data, true, Some(age.as_secs()), None);
        }
    }

    match state.krx.trending_stocks().await {
        Ok(data) => {
            state.trending.store(data.clone()).await;
            snapshot_response(data, false, None, None)
        }
        Err(e) => {
            warn!(error = %e, "Trending stocks refresh failed");
            match state.trending.any().await {
                Some(stale) => snapshot_response(stale, true, None, Some(STALE_SNAPSHOT_NOTE)),
                None => error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to fetch trending stocks",
                ),
            }
        }
    }
}

/// GET /api/markets/economy
pub async fn economy_indicators(
    State(state): State<AppState>,
    Query(params): Query<SnapshotParams>,
) -> Response {
    if !force_refresh(&params) {
        if let Some((data, age)) = state.economy.fresh(SNAPSHOT_TTL).await {
            return snapshot_response(data, true, Some(age.as_secs()), None);
        }
    }

    // The snapshot call itself never fails; a snapshot where every leg
    // is a placeholder counts as a failed refresh.
    let snapshot = state.quotes.economy_snapshot().await;
    if snapshot.has_any_data() {
        state.economy.store(snapshot.clone()).await;
        return snapshot_response(snapshot, false, None, None);
    }

    warn!("Economy refresh produced no data on any leg");
    match state.economy.any().await {
        Some(stale) => snapshot_response(stale, true, None, Some(STALE_SNAPSHOT_NOTE)),
        None => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to fetch economy indicators",
        ),
    }
}

fn force_refresh(params: &SnapshotParams) -> bool {
    params.force.as_deref() == Some("true")
}

fn snapshot_response<T: Serialize>(
    data: T,
    cached: bool,
    cache_age: Option<u64>,
    error: Option<&str>,
) -> Response {
    Json(SnapshotResponse {
        success: true,
        data,
        cached,
        cache_age,
        error: error.map(str::to_string),
    })
    .into_response()
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "herald",
        version: env!("CARGO_PKG_VERSION"),
        mode: state.mode.to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

// ---------------------------------------------------------------------------
// Degradation ladder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum ListKind {
    Latest,
    Breaking,
}

async fn collect_list(
    collector: &Arc<dyn NewsCollector>,
    kind: ListKind,
    sources: &[String],
) -> Result<Vec<NewsItem>, HeraldError> {
    match kind {
        ListKind::Latest => collector.latest(LATEST_LIMIT, sources).await,
        ListKind::Breaking => collector.breaking(BREAKING_LIMIT, sources).await,
    }
}

/// Collector, then fallback, then stale cache, then empty.
async fn serve_list(
    state: &ServiceState,
    kind: ListKind,
    key: &str,
    ttl: Duration,
    sources: &[String],
) -> (DataOrigin, Vec<NewsItem>) {
    match collect_list(&state.collector, kind, sources).await {
        Ok(data) => {
            state.cache.set(key, &data, ttl).await;
            return (state.collector.origin(), data);
        }
        Err(e) => warn!(key, error = %e, "Primary collector failed"),
    }

    if let Some(fallback) = &state.fallback {
        match collect_list(fallback, kind, sources).await {
            Ok(data) => {
                state.cache.set(key, &data, ttl).await;
                return (fallback.origin(), data);
            }
            Err(e) => warn!(key, error = %e, "Fallback collector failed"),
        }
    }

    if let Some(data) = state.cache.get_stale::<Vec<NewsItem>>(key).await {
        debug!(key, "Serving stale cache entry");
        return (DataOrigin::Cache, data);
    }

    (state.collector.origin(), Vec::new())
}

/// Same ladder for category pages, which cache whole [`Page`] values.
async fn serve_topic(
    state: &ServiceState,
    category: NewsCategory,
    sources: &[String],
    limit: usize,
    offset: usize,
    key: &str,
) -> Page {
    match state.collector.by_category(category, sources).await {
        Ok(items) => {
            let page = paginate(items, offset, limit, topic_origin(state.collector.origin()));
            state.cache.set(key, &page, TTL_TOPIC).await;
            return page;
        }
        Err(e) => warn!(key, error = %e, "Primary collector failed"),
    }

    if let Some(fallback) = &state.fallback {
        match fallback.by_category(category, sources).await {
            Ok(items) => {
                let page = paginate(items, offset, limit, topic_origin(fallback.origin()));
                state.cache.set(key, &page, TTL_TOPIC).await;
                return page;
            }
            Err(e) => warn!(key, error = %e, "Fallback collector failed"),
        }
    }

    if let Some(page) = state.cache.get_stale::<Page>(key).await {
        debug!(key, "Serving stale cache entry");
        return page.with_origin(DataOrigin::Cache);
    }

    Page::empty(topic_origin(state.collector.origin()))
}

/// Category reads in database mode come back hybrid-enriched, and the
/// envelope tag reflects that.
fn topic_origin(origin: DataOrigin) -> DataOrigin {
    match origin {
        DataOrigin::Database => DataOrigin::DatabaseHybrid,
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Small helpers
// ---------------------------------------------------------------------------

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Comma-separated `sources` parameter into a clean name list.
fn split_sources(param: Option<&str>) -> Vec<String> {
    param
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Cache keys carry the raw sources string so differently filtered
/// responses never collide.
fn suffixed_key(base: &str, sources: Option<&str>) -> String {
    match sources {
        Some(raw) => format!("{base}:{raw}"),
        None => base.to_string(),
    }
}

fn topic_key(category: NewsCategory, sources: Option<&str>, limit: usize, offset: usize) -> String {
    let base = suffixed_key(&format!("news:topic:{category}:hybrid"), sources);
    format!("{base}:{limit}:{offset}")
}

fn search_key(keyword: &str, sources: Option<&str>, page: usize, limit: usize) -> String {
    let base = suffixed_key(&format!("news:search:{keyword}"), sources);
    format!("{base}:{page}:{limit}")
}

fn paginate(items: Vec<NewsItem>, offset: usize, limit: usize, origin: DataOrigin) -> Page {
    let total = items.len();
    let data: Vec<NewsItem> = items.into_iter().skip(offset).take(limit).collect();
    Page {
        data,
        total,
        has_more: offset + limit < total,
        origin,
    }
}

/// Source filter for search results. The external leg's items stay
/// visible because the filter's names come from the feed registry,
/// which the external leg is not part of.
fn filter_search_sources(items: Vec<NewsItem>, sources: &[String]) -> Vec<NewsItem> {
    if sources.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| {
            item.source == GOOGLE_NEWS_SOURCE || sources.iter().any(|s| s == &item.source)
        })
        .collect()
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            success: false,
            error: message.into(),
        }),
    )
        .into_response()
}

fn herald_error_response(err: &HeraldError) -> Response {
    let status = match err {
        HeraldError::InvalidInput(_) | HeraldError::ContentTooShort { .. } => {
            StatusCode::BAD_REQUEST
        }
        HeraldError::NotFound(_) => StatusCode::NOT_FOUND,
        HeraldError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChangeType, Indicator};
    use chrono::Utc;

    #[test]
    fn test_split_sources() {
        assert!(split_sources(None).is_empty());
        assert_eq!(
            split_sources(Some("연합뉴스,한겨레")),
            vec!["연합뉴스".to_string(), "한겨레".to_string()]
        );
        assert_eq!(
            split_sources(Some(" SBS , ,MBC ")),
            vec!["SBS".to_string(), "MBC".to_string()]
        );
        assert!(split_sources(Some("")).is_empty());
    }

    #[test]
    fn test_cache_key_formats() {
        assert_eq!(suffixed_key("news:latest", None), "news:latest");
        assert_eq!(
            suffixed_key("news:latest", Some("연합뉴스")),
            "news:latest:연합뉴스"
        );
        assert_eq!(
            topic_key(NewsCategory::Economy, None, 20, 0),
            "news:topic:economy:hybrid:20:0"
        );
        assert_eq!(
            topic_key(NewsCategory::Economy, Some("SBS,MBC"), 10, 20),
            "news:topic:economy:hybrid:SBS,MBC:10:20"
        );
        assert_eq!(search_key("금리", None, 1, 30), "news:search:금리:1:30");
        assert_eq!(
            search_key("금리", Some("한겨레"), 2, 10),
            "news:search:금리:한겨레:2:10"
        );
    }

    #[test]
    fn test_paginate_math() {
        let items: Vec<NewsItem> = (0..25)
            .map(|i| NewsItem::sample_at(&format!("https://a.test/{i}"), i))
            .collect();

        let page = paginate(items.clone(), 0, 20, DataOrigin::Database);
        assert_eq!(page.data.len(), 20);
        assert_eq!(page.total, 25);
        assert!(page.has_more);

        let page = paginate(items.clone(), 20, 20, DataOrigin::Database);
        assert_eq!(page.data.len(), 5);
        assert!(!page.has_more);

        // offset + limit == total is the exact boundary
        let page = paginate(items.clone(), 5, 20, DataOrigin::Database);
        assert_eq!(page.data.len(), 20);
        assert!(!page.has_more);

        let page = paginate(items, 40, 20, DataOrigin::Database);
        assert!(page.data.is_empty());
        assert_eq!(page.total, 25);
        assert!(!page.has_more);
    }

    #[test]
    fn test_filter_search_sources_keeps_external_leg() {
        let mut local = NewsItem::sample_at("https://a.test/local", 5);
        local.source = "연합뉴스".to_string();
        let mut filtered_out = NewsItem::sample_at("https://a.test/other", 6);
        filtered_out.source = "한겨레".to_string();
        let mut external = NewsItem::sample_at("https://news.google.com/x", 7);
        external.source = GOOGLE_NEWS_SOURCE.to_string();

        let items = vec![local, filtered_out, external];
        let kept = filter_search_sources(items.clone(), &["연합뉴스".to_string()]);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().any(|i| i.source == "연합뉴스"));
        assert!(kept.iter().any(|i| i.source == GOOGLE_NEWS_SOURCE));

        // no filter keeps everything
        assert_eq!(filter_search_sources(items, &[]).len(), 3);
    }

    #[test]
    fn test_topic_origin_mapping() {
        assert_eq!(
            topic_origin(DataOrigin::Database),
            DataOrigin::DatabaseHybrid
        );
        assert_eq!(
            topic_origin(DataOrigin::RealtimeRss),
            DataOrigin::RealtimeRss
        );
        assert_eq!(topic_origin(DataOrigin::Cache), DataOrigin::Cache);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_slot_freshness_window() {
        let slot: SnapshotSlot<u32> = SnapshotSlot::new();
        assert!(slot.fresh(SNAPSHOT_TTL).await.is_none());
        assert!(slot.any().await.is_none());

        slot.store(7).await;
        tokio::time::advance(Duration::from_secs(60)).await;

        let (value, age) = slot.fresh(SNAPSHOT_TTL).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(age.as_secs(), 60);

        tokio::time::advance(Duration::from_secs(121)).await;
        assert!(slot.fresh(SNAPSHOT_TTL).await.is_none());
        assert_eq!(slot.any().await, Some(7));
    }

    #[test]
    fn test_force_refresh_parsing() {
        assert!(force_refresh(&SnapshotParams {
            force: Some("true".to_string())
        }));
        assert!(!force_refresh(&SnapshotParams {
            force: Some("1".to_string())
        }));
        assert!(!force_refresh(&SnapshotParams { force: None }));
    }

    #[test]
    fn test_topic_response_wire_shape() {
        let response = TopicResponse {
            success: true,
            category: "economy".to_string(),
            source: DataOrigin::DatabaseHybrid,
            data: vec![],
            total: 42,
            has_more: true,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json.get("hasMore"), Some(&serde_json::json!(true)));
        assert_eq!(
            json.get("source"),
            Some(&serde_json::json!("database-hybrid"))
        );
        assert!(json.get("has_more").is_none());
    }

    #[test]
    fn test_search_response_flattens_body() {
        let response = SearchResponse {
            success: true,
            body: SearchBody {
                keyword: "금리".to_string(),
                page: 1,
                total_pages: 3,
                total: 65,
                data: vec![],
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json.get("success"), Some(&serde_json::json!(true)));
        assert_eq!(json.get("keyword"), Some(&serde_json::json!("금리")));
        assert_eq!(json.get("totalPages"), Some(&serde_json::json!(3)));
        assert!(json.get("body").is_none());
        assert!(json.get("source").is_none());
        assert!(json.get("hasMore").is_none());
    }

    #[test]
    fn test_snapshot_response_omits_empty_fields() {
        let fresh = snapshot_json_value(false, None, None);
        assert!(fresh.get("cacheAge").is_none());
        assert!(fresh.get("error").is_none());

        let warm = snapshot_json_value(true, Some(42), None);
        assert_eq!(warm.get("cacheAge"), Some(&serde_json::json!(42)));

        let stale = snapshot_json_value(true, None, Some(STALE_SNAPSHOT_NOTE));
        assert_eq!(
            stale.get("error"),
            Some(&serde_json::json!(STALE_SNAPSHOT_NOTE))
        );
    }

    fn snapshot_json_value(
        cached: bool,
        cache_age: Option<u64>,
        error: Option<&str>,
    ) -> serde_json::Value {
        serde_json::to_value(SnapshotResponse {
            success: true,
            data: 1u32,
            cached,
            cache_age,
            error: error.map(str::to_string),
        })
        .unwrap()
    }

    #[test]
    fn test_summary_data_cached_field_is_optional() {
        let streamed = SummaryData {
            summary: "요약".to_string(),
            keywords: vec!["금리".to_string()],
            provider: "groq".to_string(),
            cached: None,
        };
        let json = serde_json::to_value(&streamed).unwrap();
        assert!(json.get("cached").is_none());

        let one_shot = SummaryData {
            cached: Some(false),
            ..streamed
        };
        let json = serde_json::to_value(&one_shot).unwrap();
        assert_eq!(json.get("cached"), Some(&serde_json::json!(false)));
    }

    #[test]
    fn test_persisted_summary_defaults_provider() {
        let mut news = NewsItem::sample();
        news.ai_summary = Some("• 요점".to_string());
        news.ai_keywords = Some(vec!["경제".to_string()]);

        let data = persisted_summary(&news);
        assert_eq!(data.provider, "unknown");
        assert_eq!(data.summary, "• 요점");
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                HeraldError::InvalidInput("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                HeraldError::ContentTooShort {
                    length: 10,
                    minimum: 100,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                HeraldError::NotFound("x".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                HeraldError::UpstreamTimeout {
                    url: "https://a.test".to_string(),
                    seconds: 10,
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                HeraldError::Storage("locked".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(herald_error_response(&err).status(), expected, "{err}");
        }
    }

    #[test]
    fn test_health_response_wire_shape() {
        let response = HealthResponse {
            status: "ok",
            service: "herald",
            version: "0.1.0",
            mode: "database".to_string(),
            uptime_secs: 12,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json.get("uptimeSecs"), Some(&serde_json::json!(12)));
        assert_eq!(json.get("mode"), Some(&serde_json::json!("database")));
    }

    #[test]
    fn test_economy_snapshot_any_data() {
        let missing = EconomySnapshot {
            kospi: Indicator::missing("KOSPI"),
            kosdaq: Indicator::missing("KOSDAQ"),
            usd_krw: Indicator::missing("USD/KRW"),
            sp500: Indicator::missing("S&P 500"),
            nasdaq: Indicator::missing("NASDAQ"),
            dow: Indicator::missing("Dow Jones"),
            nikkei: Indicator::missing("Nikkei 225"),
            last_updated: Utc::now(),
        };
        assert!(!missing.has_any_data());

        let mut partial = missing.clone();
        partial.kospi = Indicator {
            name: "KOSPI".to_string(),
            value: "2,550.12".to_string(),
            change: "+12.34".to_string(),
            change_percent: "+0.49%".to_string(),
            change_type: ChangeType::Up,
        };
        assert!(partial.has_any_data());
    }
}
