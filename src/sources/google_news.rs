//! Google News realtime search client.
//!
//! External leg of hybrid search. Queries the Google News RSS search
//! endpoint (Korean edition) with either a free keyword or a
//! category-derived keyword expression, and normalizes results under
//! the fixed source name "Google News".
//!
//! Endpoint: https://news.google.com/rss/search
//! No auth, no documented rate limit; results cap at ~100 per query.

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::rss::{parse_published, scrub_xml_entities};
use super::{clean_text, clip_text};
use crate::types::{HeraldError, NewsCategory, NewsItem};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const SEARCH_URL: &str = "https://news.google.com/rss/search";
const SOURCE_NAME: &str = "Google News";

/// Search summaries are capped harder than feed summaries; result
/// lists are wide and the reader only needs a scent.
const SUMMARY_MAX_CHARS: usize = 200;

/// Keyword expression submitted for a category search.
fn category_query(category: NewsCategory) -> &'static str {
    match category {
        NewsCategory::Breaking => "속보 OR 긴급",
        NewsCategory::General => "뉴스",
        NewsCategory::Politics => "정치 OR 국회 OR 대통령",
        NewsCategory::Economy => "경제 OR 증시 OR 금융",
        NewsCategory::Society => "사회 OR 교육 OR 환경",
        NewsCategory::World => "국제 OR 해외 OR 글로벌",
        NewsCategory::Culture => "문화 OR 전시 OR 공연",
        NewsCategory::Sports => "스포츠 OR 축구 OR 야구",
        NewsCategory::Entertainment => "연예 OR 영화 OR 드라마",
        NewsCategory::Tech => "과학 OR 기술 OR AI",
    }
}

// ---------------------------------------------------------------------------
// Search result document types (Google News RSS → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    /// Publisher element: `<source url="...">연합뉴스</source>`.
    #[serde(rename = "source")]
    publisher: Option<PublisherRef>,
    #[serde(rename = "enclosure", default)]
    enclosures: Vec<Enclosure>,
}

#[derive(Debug, Deserialize)]
struct PublisherRef {
    #[serde(rename = "$text")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Enclosure {
    #[serde(rename = "@url")]
    url: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Google News RSS search client.
pub struct GoogleNewsClient {
    http: Client,
    /// Cap on normalized results per query.
    max_results: usize,
}

impl GoogleNewsClient {
    pub fn new(http: Client, max_results: usize) -> Self {
        Self { http, max_results }
    }

    /// Search by a free keyword (user query). Results carry no better
    /// category signal than the query itself, so they land in General.
    pub async fn search_keyword(&self, keyword: &str) -> Result<Vec<NewsItem>, HeraldError> {
        self.search(keyword, NewsCategory::General).await
    }

    /// Search with a category's keyword expression; results are tagged
    /// with that category.
    pub async fn search_category(
        &self,
        category: NewsCategory,
    ) -> Result<Vec<NewsItem>, HeraldError> {
        self.search(category_query(category), category).await
    }

    // -- Internal helpers ------------------------------------------------

    async fn search(
        &self,
        query: &str,
        category: NewsCategory,
    ) -> Result<Vec<NewsItem>, HeraldError> {
        let url = format!(
            "{SEARCH_URL}?q={}&hl=ko&gl=KR&ceid=KR:ko",
            urlencoding::encode(query),
        );

        debug!(query, url = %url, "Searching Google News");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| HeraldError::source_fetch(SOURCE_NAME, e))?;

        if !resp.status().is_success() {
            return Err(HeraldError::source_fetch(
                SOURCE_NAME,
                format!("HTTP {}", resp.status()),
            ));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| HeraldError::source_fetch(SOURCE_NAME, e))?;

        let items = self.parse_search_feed(&body, category)?;
        debug!(query, count = items.len(), "Google News search complete");
        Ok(items)
    }

    fn parse_search_feed(
        &self,
        body: &str,
        category: NewsCategory,
    ) -> Result<Vec<NewsItem>, HeraldError> {
        let scrubbed = scrub_xml_entities(body);
        let rss: Rss = quick_xml::de::from_str(&scrubbed)
            .map_err(|e| HeraldError::source_fetch(SOURCE_NAME, format!("XML parse: {e}")))?;

        let mut out = Vec::new();
        for item in &rss.channel.items {
            if out.len() >= self.max_results {
                break;
            }
            let Some(link) = item.link.as_deref().map(str::trim).filter(|l| !l.is_empty())
            else {
                continue;
            };

            let publisher = item
                .publisher
                .as_ref()
                .and_then(|p| p.name.as_deref())
                .map(clean_text);
            let raw_title = clean_text(item.title.as_deref().unwrap_or_default());
            let title = strip_publisher_suffix(&raw_title, publisher.as_deref());
            if title.is_empty() {
                continue;
            }

            let summary = clip_text(
                &clean_text(item.description.as_deref().unwrap_or_default()),
                SUMMARY_MAX_CHARS,
            );
            let summary = if summary.is_empty() { title.clone() } else { summary };

            out.push(NewsItem {
                id: NewsItem::stable_id(link),
                title,
                url: link.to_string(),
                summary,
                source: SOURCE_NAME.to_string(),
                category,
                published_at: parse_published(item.pub_date.as_deref(), false),
                image_url: item.enclosures.iter().find_map(|e| e.url.clone()),
                is_breaking: false,
                ai_summary: None,
                ai_keywords: None,
                ai_summarized_at: None,
                ai_provider: None,
            });
        }

        Ok(out)
    }
}

/// Google News appends " - 언론사" to every result title; when the
/// item's `<source>` element names that publisher, cut the suffix.
fn strip_publisher_suffix(title: &str, publisher: Option<&str>) -> String {
    if let Some(publisher) = publisher.filter(|p| !p.is_empty()) {
        if let Some(stripped) = title.strip_suffix(&format!(" - {publisher}")) {
            if !stripped.is_empty() {
                return stripped.to_string();
            }
        }
    }
    title.to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
