//! Shared types for the HERALD service.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that source, collector,
//! and server modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// News items
// ---------------------------------------------------------------------------

/// A single news article, normalized from any source.
///
/// Identity for deduplication is the exact `url` string; case and
/// query-string variants are treated as distinct articles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    /// Stable id derived from the URL (UUID v5), identical across
    /// collection passes so on-demand lookups survive cache churn.
    pub id: String,
    pub title: String,
    pub url: String,
    pub summary: String,
    /// Human-readable source name: "연합뉴스" | "Google News" | ...
    pub source: String,
    pub category: NewsCategory,
    pub published_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_breaking: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_summarized_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_provider: Option<String>,
}

impl fmt::Display for NewsItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}, {})",
            self.source,
            self.title,
            self.category,
            self.published_at.format("%Y-%m-%d %H:%M"),
        )
    }
}

impl NewsItem {
    /// Deterministic article id derived from the URL.
    pub fn stable_id(url: &str) -> String {
        uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_URL, url.as_bytes()).to_string()
    }

    /// Whether this item already carries a persisted AI summary.
    pub fn has_ai_summary(&self) -> bool {
        self.ai_summary.is_some() && self.ai_keywords.is_some()
    }

    /// Whether the item was published within the given window.
    pub fn is_within(&self, window: chrono::Duration) -> bool {
        Utc::now() - self.published_at <= window
    }

    /// Helper to build a test/sample item with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        let url = "https://news.example.co.kr/article/0001".to_string();
        NewsItem {
            id: NewsItem::stable_id(&url),
            title: "삼성전자, 2분기 실적 발표".to_string(),
            url,
            summary: "삼성전자가 2분기 잠정 실적을 발표했다.".to_string(),
            source: "연합뉴스".to_string(),
            category: NewsCategory::Economy,
            published_at: Utc::now() - chrono::Duration::minutes(10),
            image_url: None,
            is_breaking: false,
            ai_summary: None,
            ai_keywords: None,
            ai_summarized_at: None,
            ai_provider: None,
        }
    }

    /// Sample item with a specific URL and publish offset, for merge tests.
    #[cfg(test)]
    pub fn sample_at(url: &str, minutes_ago: i64) -> Self {
        let mut item = NewsItem::sample();
        item.id = NewsItem::stable_id(url);
        item.url = url.to_string();
        item.published_at = Utc::now() - chrono::Duration::minutes(minutes_ago);
        item
    }
}

// ---------------------------------------------------------------------------
// Categories & data origins
// ---------------------------------------------------------------------------

/// News category for routing to the appropriate feeds.
///
/// `Breaking` and `General` are registry categories in their own right
/// (dedicated feeds exist for both), not just view filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsCategory {
    Breaking,
    General,
    Politics,
    Economy,
    Society,
    World,
    Culture,
    Sports,
    Entertainment,
    Tech,
}

impl NewsCategory {
    /// All known categories (useful for iteration).
    pub const ALL: &'static [NewsCategory] = &[
        NewsCategory::Breaking,
        NewsCategory::General,
        NewsCategory::Politics,
        NewsCategory::Economy,
        NewsCategory::Society,
        NewsCategory::World,
        NewsCategory::Culture,
        NewsCategory::Sports,
        NewsCategory::Entertainment,
        NewsCategory::Tech,
    ];

    /// Korean display label, as shown to end users.
    pub fn label_ko(&self) -> &'static str {
        match self {
            NewsCategory::Breaking => "속보",
            NewsCategory::General => "종합",
            NewsCategory::Politics => "정치",
            NewsCategory::Economy => "경제",
            NewsCategory::Society => "사회",
            NewsCategory::World => "국제",
            NewsCategory::Culture => "문화",
            NewsCategory::Sports => "스포츠",
            NewsCategory::Entertainment => "연예",
            NewsCategory::Tech => "IT/과학",
        }
    }
}

impl fmt::Display for NewsCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NewsCategory::Breaking => write!(f, "breaking"),
            NewsCategory::General => write!(f, "general"),
            NewsCategory::Politics => write!(f, "politics"),
            NewsCategory::Economy => write!(f, "economy"),
            NewsCategory::Society => write!(f, "society"),
            NewsCategory::World => write!(f, "world"),
            NewsCategory::Culture => write!(f, "culture"),
            NewsCategory::Sports => write!(f, "sports"),
            NewsCategory::Entertainment => write!(f, "entertainment"),
            NewsCategory::Tech => write!(f, "tech"),
        }
    }
}

/// Attempt to parse a string into a NewsCategory (case-insensitive,
/// accepting both the route slugs and the Korean labels).
impl std::str::FromStr for NewsCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "breaking" | "속보" => Ok(NewsCategory::Breaking),
            "general" | "종합" => Ok(NewsCategory::General),
            "politics" | "정치" => Ok(NewsCategory::Politics),
            "economy" | "econ" | "경제" => Ok(NewsCategory::Economy),
            "society" | "사회" => Ok(NewsCategory::Society),
            "world" | "international" | "국제" | "세계" => Ok(NewsCategory::World),
            "culture" | "문화" => Ok(NewsCategory::Culture),
            "sports" | "sport" | "스포츠" => Ok(NewsCategory::Sports),
            "entertainment" | "연예" => Ok(NewsCategory::Entertainment),
            "tech" | "it" | "science" | "it/과학" => Ok(NewsCategory::Tech),
            _ => Err(anyhow::anyhow!("Unknown news category: {s}")),
        }
    }
}

/// Which layer actually served a result set.
///
/// Serialized values are part of the API contract and must stay exactly
/// as-is: "cache" | "database" | "realtime-rss" | "database-hybrid".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataOrigin {
    Cache,
    Database,
    RealtimeRss,
    DatabaseHybrid,
}

impl fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataOrigin::Cache => write!(f, "cache"),
            DataOrigin::Database => write!(f, "database"),
            DataOrigin::RealtimeRss => write!(f, "realtime-rss"),
            DataOrigin::DatabaseHybrid => write!(f, "database-hybrid"),
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregated pages
// ---------------------------------------------------------------------------

/// One page of aggregated results, constructed per request and never
/// mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub data: Vec<NewsItem>,
    /// Item count of the full filtered set, before pagination.
    pub total: usize,
    pub has_more: bool,
    #[serde(rename = "source")]
    pub origin: DataOrigin,
}

impl Page {
    /// An empty, well-typed page for the given origin.
    pub fn empty(origin: DataOrigin) -> Self {
        Page {
            data: Vec::new(),
            total: 0,
            has_more: false,
            origin,
        }
    }

    /// Same page content re-tagged with a different serving layer.
    pub fn with_origin(mut self, origin: DataOrigin) -> Self {
        self.origin = origin;
        self
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} items (total={}, has_more={}, origin={})",
            self.data.len(),
            self.total,
            self.has_more,
            self.origin,
        )
    }
}

// ---------------------------------------------------------------------------
// Market snapshots
// ---------------------------------------------------------------------------

/// Direction of an indicator's latest move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Up,
    Down,
    Unchanged,
}

/// One formatted market indicator (index level, FX rate, ...).
///
/// Values are display strings: the upstream sources mix scales and
/// locales, so formatting happens at ingest and the API passes strings
/// through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Indicator {
    pub name: String,
    pub value: String,
    pub change: String,
    pub change_percent: String,
    pub change_type: ChangeType,
}

impl Indicator {
    /// Placeholder indicator for a leg whose upstream fetch failed.
    pub fn missing(name: &str) -> Self {
        Indicator {
            name: name.to_string(),
            value: "데이터 없음".to_string(),
            change: "0".to_string(),
            change_percent: "0".to_string(),
            change_type: ChangeType::Unchanged,
        }
    }

    /// Whether this indicator carries real data.
    pub fn is_present(&self) -> bool {
        self.value != "데이터 없음"
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({} / {}%)",
            self.name, self.value, self.change, self.change_percent,
        )
    }
}

/// One row of a trending-stocks table, already ranked and formatted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingStockItem {
    pub rank: u32,
    pub code: String,
    pub name: String,
    pub price: String,
    pub change: String,
    pub change_percent: String,
    pub change_type: ChangeType,
    pub volume: String,
}

/// Trending-stocks snapshot: top-10 tables by volume, gainers, losers.
/// Replaced wholesale on each successful refresh, never field-patched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingStocksData {
    #[serde(rename = "volume")]
    pub by_volume: Vec<TrendingStockItem>,
    pub gainers: Vec<TrendingStockItem>,
    pub losers: Vec<TrendingStockItem>,
    pub last_updated: DateTime<Utc>,
}

/// Flat economy snapshot; every field is an [`Indicator`] so a failed
/// leg degrades to its placeholder without losing the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomySnapshot {
    pub kospi: Indicator,
    pub kosdaq: Indicator,
    pub usd_krw: Indicator,
    pub sp500: Indicator,
    pub nasdaq: Indicator,
    pub dow: Indicator,
    pub nikkei: Indicator,
    pub last_updated: DateTime<Utc>,
}

impl EconomySnapshot {
    /// Whether at least one leg carries a real quote. A snapshot of
    /// seven placeholders is a refresh failure, not data.
    pub fn has_any_data(&self) -> bool {
        [
            &self.kospi,
            &self.kosdaq,
            &self.usd_krw,
            &self.sp500,
            &self.nasdaq,
            &self.dow,
            &self.nikkei,
        ]
        .into_iter()
        .any(|leg| leg.is_present())
    }
}

// ---------------------------------------------------------------------------
// AI summarization
// ---------------------------------------------------------------------------

/// A single summarization request, provider-agnostic.
#[derive(Debug, Clone)]
pub struct SummaryRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Schema every provider must normalize its output to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResult {
    pub summary: String,
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_liner: Option<String>,
}

impl SummaryResult {
    /// Whether the result satisfies the schema contract: non-empty
    /// summary and at least one keyword.
    pub fn is_valid(&self) -> bool {
        !self.summary.trim().is_empty() && !self.keywords.is_empty()
    }
}

/// A successful run of the provider fallback chain.
#[derive(Debug, Clone)]
pub struct SummaryOutcome {
    pub result: SummaryResult,
    /// Name of the provider that actually produced the result.
    pub provider: String,
}

/// One failed provider attempt, recorded in configured order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    pub provider: String,
    pub error: String,
}

impl fmt::Display for ProviderAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}

/// Events emitted by the streaming summarization path.
///
/// A stream is an ordered sequence of `token` events terminated by
/// exactly one `done` or one `error`, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Token {
        content: String,
    },
    Done {
        result: SummaryResult,
        provider: String,
        /// "scraped" when the article body was fetched, "summary"
        /// when the RSS summary served as fallback input.
        #[serde(rename = "contentSource")]
        content_source: String,
    },
    Error {
        error: String,
    },
}

impl StreamEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for HERALD.
#[derive(Debug, thiserror::Error)]
pub enum HeraldError {
    #[error("Source fetch error ({name}): {message}")]
    SourceFetch { name: String, message: String },

    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("All providers failed after {} attempts", attempts.len())]
    AllProvidersFailed { attempts: Vec<ProviderAttempt> },

    #[error("Content too short for summarization: {length} chars (minimum {minimum})")]
    ContentTooShort { length: usize, minimum: usize },

    #[error("Upstream timeout after {seconds}s: {url}")]
    UpstreamTimeout { url: String, seconds: u64 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl HeraldError {
    /// Shorthand for a source fetch failure wrapping any error.
    pub fn source_fetch(name: &str, err: impl fmt::Display) -> Self {
        HeraldError::SourceFetch {
            name: name.to_string(),
            message: err.to_string(),
        }
    }

    /// Shorthand for a provider failure wrapping any error.
    pub fn provider(provider: &str, err: impl fmt::Display) -> Self {
        HeraldError::Provider {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
