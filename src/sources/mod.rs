//! News source integrations.
//!
//! Defines the `NewsSource` trait, the static feed registry, and the
//! text normalization shared by every adapter:
//! - RSS feeds (Korean dailies, broadcasters, Google News topic feeds)
//! - Google News realtime search (external leg of hybrid search)
//! - Article body extraction for AI summarization input

pub mod article;
pub mod google_news;
pub mod rss;

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::Client;
use std::time::Duration;

use crate::types::{HeraldError, NewsCategory, NewsItem};

/// Shared HTTP client for upstream fetches.
///
/// One client per concern (feeds, search, scraping) so per-concern
/// timeouts apply; clones share the underlying connection pool.
pub fn build_http_client(timeout: Duration, user_agent: &str) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .context("Failed to build HTTP client")
}

/// Abstraction over a single origin of news items.
///
/// A failing source (timeout, non-200, malformed payload) reports its
/// own error; callers treat that as an empty contribution and continue
/// with sibling sources.
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Fetch and normalize the source's current items.
    async fn fetch(&self) -> Result<Vec<NewsItem>, HeraldError>;

    /// Category this source contributes to.
    fn category(&self) -> NewsCategory;

    /// Source name for logging, filtering, and identification.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Feed registry
// ---------------------------------------------------------------------------

/// One registry entry describing an RSS feed.
#[derive(Debug, Clone, Copy)]
pub struct FeedSpec {
    pub name: &'static str,
    pub category: NewsCategory,
    pub url: &'static str,
    /// Editorial weight; higher feeds come first in the registry and
    /// therefore win dedup ties during fan-out.
    pub priority: u8,
    pub enabled: bool,
    /// pubDate is labeled GMT but actually carries KST wall-clock time.
    pub kst_labeled_gmt: bool,
}

/// Every feed the service knows about, in fan-out order.
pub const FEED_REGISTRY: &[FeedSpec] = &[
    // -- 속보 --
    FeedSpec {
        name: "Google News 속보",
        category: NewsCategory::Breaking,
        url: "https://news.google.com/rss/search?q=%EC%86%8D%EB%B3%B4+OR+%EA%B8%B4%EA%B8%89&hl=ko&gl=KR&ceid=KR:ko",
        priority: 10,
        enabled: true,
        kst_labeled_gmt: false,
    },
    // -- Google News 카테고리별 --
    FeedSpec {
        name: "Google News 정치",
        category: NewsCategory::Politics,
        url: "https://news.google.com/rss/search?q=%EC%A0%95%EC%B9%98+OR+%EA%B5%AD%ED%9A%8C+OR+%EB%8C%80%ED%86%B5%EB%A0%B9&hl=ko&gl=KR&ceid=KR:ko",
        priority: 9,
        enabled: true,
        kst_labeled_gmt: false,
    },
    FeedSpec {
        name: "Google News 경제",
        category: NewsCategory::Economy,
        url: "https://news.google.com/rss/search?q=%EA%B2%BD%EC%A0%9C+OR+%EC%A1%B1%EC%8B%9C+OR+%EA%B8%88%EC%9C%B5&hl=ko&gl=KR&ceid=KR:ko",
        priority: 9,
        enabled: true,
        kst_labeled_gmt: false,
    },
    FeedSpec {
        name: "Google News IT",
        category: NewsCategory::Tech,
        url: "https://news.google.com/rss/search?q=%EA%B3%BC%ED%95%99+OR+%EA%B8%B0%EC%88%A0+OR+AI&hl=ko&gl=KR&ceid=KR:ko",
        priority: 8,
        enabled: true,
        kst_labeled_gmt: false,
    },
    FeedSpec {
        name: "Google News 스포츠",
        category: NewsCategory::Sports,
        url: "https://news.google.com/rss/search?q=%EC%8A%A4%ED%8F%AC%EC%B8%A0+OR+%EC%B6%95%EA%B5%AC+OR+%EC%95%BC%EA%B5%AC&hl=ko&gl=KR&ceid=KR:ko",
        priority: 8,
        enabled: true,
        kst_labeled_gmt: false,
    },
    // -- 종합 일간지 --
    FeedSpec {
        name: "동아일보",
        category: NewsCategory::General,
        url: "http://rss.donga.com/total.xml",
        priority: 8,
        enabled: true,
        kst_labeled_gmt: false,
    },
    FeedSpec {
        name: "조선일보",
        category: NewsCategory::General,
        url: "https://www.chosun.com/arc/outboundfeeds/rss/?outputType=xml",
        priority: 8,
        enabled: true,
        kst_labeled_gmt: false,
    },
    FeedSpec {
        name: "경향신문",
        category: NewsCategory::General,
        url: "http://www.khan.co.kr/rss/rssdata/total_news.xml",
        priority: 8,
        enabled: true,
        kst_labeled_gmt: false,
    },
    FeedSpec {
        name: "오마이뉴스",
        category: NewsCategory::General,
        url: "https://rss.ohmynews.com/rss/ohmynews.xml",
        priority: 6,
        enabled: true,
        kst_labeled_gmt: false,
    },
    FeedSpec {
        name: "노컷뉴스",
        category: NewsCategory::General,
        url: "http://rss.nocutnews.co.kr/nocutnews.xml",
        priority: 7,
        enabled: true,
        kst_labeled_gmt: true,
    },
    FeedSpec {
        name: "세계일보",
        category: NewsCategory::General,
        url: "http://www.segye.com/Articles/RSSList/segye_recent.xml",
        priority: 7,
        enabled: true,
        kst_labeled_gmt: false,
    },
    // -- 방송사 --
    FeedSpec {
        name: "SBS",
        category: NewsCategory::General,
        url: "https://news.sbs.co.kr/news/SectionRssFeed.do?sectionId=01",
        priority: 7,
        enabled: true,
        kst_labeled_gmt: false,
    },
    // -- 정치 --
    FeedSpec {
        name: "동아일보 정치",
        category: NewsCategory::Politics,
        url: "http://rss.donga.com/politics.xml",
        priority: 7,
        enabled: true,
        kst_labeled_gmt: false,
    },
    FeedSpec {
        name: "SBS 정치",
        category: NewsCategory::Politics,
        url: "https://news.sbs.co.kr/news/SectionRssFeed.do?sectionId=07",
        priority: 7,
        enabled: true,
        kst_labeled_gmt: false,
    },
    // -- 경제 --
    FeedSpec {
        name: "동아일보 경제",
        category: NewsCategory::Economy,
        url: "http://rss.donga.com/economy.xml",
        priority: 7,
        enabled: true,
        kst_labeled_gmt: false,
    },
    FeedSpec {
        name: "매일경제",
        category: NewsCategory::Economy,
        url: "https://www.mk.co.kr/rss/30100041/",
        priority: 7,
        enabled: true,
        kst_labeled_gmt: false,
    },
    FeedSpec {
        name: "머니투데이",
        category: NewsCategory::Economy,
        url: "https://rss.mt.co.kr/mt_news.xml",
        priority: 7,
        enabled: true,
        kst_labeled_gmt: false,
    },
    FeedSpec {
        name: "SBS 경제",
        category: NewsCategory::Economy,
        url: "https://news.sbs.co.kr/news/SectionRssFeed.do?sectionId=01&plink=SUBTYPE",
        priority: 6,
        enabled: true,
        kst_labeled_gmt: false,
    },
    FeedSpec {
        name: "이데일리",
        category: NewsCategory::Economy,
        url: "http://rss.edaily.co.kr/edaily_news.xml",
        priority: 7,
        enabled: true,
        kst_labeled_gmt: false,
    },
    // -- IT/과학 --
    FeedSpec {
        name: "동아일보 IT",
        category: NewsCategory::Tech,
        url: "http://rss.donga.com/science.xml",
        priority: 6,
        enabled: true,
        kst_labeled_gmt: false,
    },
    FeedSpec {
        name: "전자신문",
        category: NewsCategory::Tech,
        url: "http://rss.etnews.com/Section901.xml",
        priority: 7,
        enabled: true,
        kst_labeled_gmt: false,
    },
    // -- 스포츠 --
    FeedSpec {
        name: "동아일보 스포츠",
        category: NewsCategory::Sports,
        url: "http://rss.donga.com/sports.xml",
        priority: 5,
        enabled: true,
        kst_labeled_gmt: false,
    },
    FeedSpec {
        name: "SBS 스포츠",
        category: NewsCategory::Sports,
        url: "https://news.sbs.co.kr/news/SectionRssFeed.do?sectionId=07&plink=SUBTYPE",
        priority: 6,
        enabled: true,
        kst_labeled_gmt: false,
    },
    // -- 사회 --
    FeedSpec {
        name: "Google News 사회",
        category: NewsCategory::Society,
        url: "https://news.google.com/rss/search?q=%EC%82%AC%ED%9A%8C+OR+%EA%B5%90%EC%9C%A1+OR+%ED%99%98%EA%B2%BD&hl=ko&gl=KR&ceid=KR:ko",
        priority: 7,
        enabled: true,
        kst_labeled_gmt: false,
    },
    FeedSpec {
        name: "동아일보 사회",
        category: NewsCategory::Society,
        url: "http://rss.donga.com/national.xml",
        priority: 7,
        enabled: true,
        kst_labeled_gmt: false,
    },
    FeedSpec {
        name: "SBS 사회",
        category: NewsCategory::Society,
        url: "https://news.sbs.co.kr/news/SectionRssFeed.do?sectionId=08",
        priority: 6,
        enabled: true,
        kst_labeled_gmt: false,
    },
    // -- 국제 --
    FeedSpec {
        name: "Google News 국제",
        category: NewsCategory::World,
        url: "https://news.google.com/rss/search?q=%EA%B5%AD%EC%A0%9C+OR+%ED%95%B4%EC%99%B8+OR+%EA%B8%80%EB%A1%9C%EB%B2%8C&hl=ko&gl=KR&ceid=KR:ko",
        priority: 7,
        enabled: true,
        kst_labeled_gmt: false,
    },
    FeedSpec {
        name: "동아일보 국제",
        category: NewsCategory::World,
        url: "http://rss.donga.com/international.xml",
        priority: 7,
        enabled: true,
        kst_labeled_gmt: false,
    },
    FeedSpec {
        name: "SBS 국제",
        category: NewsCategory::World,
        url: "https://news.sbs.co.kr/news/SectionRssFeed.do?sectionId=02",
        priority: 6,
        enabled: true,
        kst_labeled_gmt: false,
    },
    // -- 연예 --
    FeedSpec {
        name: "Google News 연예",
        category: NewsCategory::Entertainment,
        url: "https://news.google.com/rss/search?q=%EC%97%B0%EC%98%88+OR+%EC%98%81%ED%99%94+OR+%EB%93%9C%EB%9D%BC%EB%A7%88&hl=ko&gl=KR&ceid=KR:ko",
        priority: 6,
        enabled: true,
        kst_labeled_gmt: false,
    },
    FeedSpec {
        name: "동아일보 연예",
        category: NewsCategory::Entertainment,
        url: "http://rss.donga.com/entertainment.xml",
        priority: 6,
        enabled: true,
        kst_labeled_gmt: false,
    },
    // -- 문화 --
    FeedSpec {
        name: "Google News 문화",
        category: NewsCategory::Culture,
        url: "https://news.google.com/rss/search?q=%EB%AC%B8%ED%99%94+OR+%EC%A0%84%EC%8B%9C+OR+%EA%B3%B5%EC%97%B0&hl=ko&gl=KR&ceid=KR:ko",
        priority: 5,
        enabled: true,
        kst_labeled_gmt: false,
    },
    FeedSpec {
        name: "동아일보 문화",
        category: NewsCategory::Culture,
        url: "http://rss.donga.com/culture.xml",
        priority: 5,
        enabled: true,
        kst_labeled_gmt: false,
    },
];

/// All enabled feeds, in fan-out order.
pub fn all_feeds() -> impl Iterator<Item = &'static FeedSpec> {
    FEED_REGISTRY.iter().filter(|feed| feed.enabled)
}

/// All enabled feeds for one category, in fan-out order.
pub fn category_feeds(category: NewsCategory) -> impl Iterator<Item = &'static FeedSpec> {
    all_feeds().filter(move |feed| feed.category == category)
}

// ---------------------------------------------------------------------------
// Text normalization
// ---------------------------------------------------------------------------

/// Strip HTML tags, decode entities, and collapse whitespace.
///
/// Korean feeds embed markup and numeric entities (&#44032; etc.) in
/// titles and descriptions; everything user-visible goes through here.
pub fn clean_text(raw: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    let stripped = re_tags.replace_all(raw, " ");

    let decoded = html_escape::decode_html_entities(stripped.as_ref()).to_string();
    collapse_whitespace(&decoded)
}

/// Collapse runs of whitespace (including newlines) to single spaces.
pub(crate) fn collapse_whitespace(raw: &str) -> String {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    re_ws.replace_all(raw, " ").trim().to_string()
}

/// Char-safe truncation with an ellipsis suffix past the cap.
pub fn clip_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let clipped: String = text.chars().take(max_chars).collect();
    format!("{clipped}...")
}

/// Normalize a feed field into a display summary (150-char cap).
pub fn summarize_field(raw: &str) -> String {
    clip_text(&clean_text(raw), 150)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
