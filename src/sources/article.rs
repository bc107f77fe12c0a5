//! Article body extraction for AI summarization.
//!
//! Fetches a news page with browser-like headers and pulls the article
//! text out with per-publisher CSS selectors, falling back to generic
//! selectors and finally to the whole `<body>`. Extraction that comes
//! back under the minimum length is an error so callers can fall back
//! to the RSS summary.

use anyhow::{Context, Result};
use reqwest::Client;
use scraper::{ElementRef, Html, Node, Selector};
use std::time::Duration;
use tracing::debug;

use super::collapse_whitespace;
use crate::types::HeraldError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Crawl with a browser identity; several outlets 403 plain clients.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANG_KO: &str = "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7";

/// Per-publisher article body selectors, most specific first.
const DOMAIN_SELECTORS: &[(&str, &[&str])] = &[
    ("yna.co.kr", &["article", ".article-txt", "#articleText"]),
    ("newsis.com", &["#textBody", ".viewer", "article"]),
    ("naver.com", &["#dic_area", "#articeBody", "article"]),
    ("chosun.com", &[".article-body", "#news_body_id", "article"]),
    ("donga.com", &[".article_txt", ".news_view", "article"]),
    ("joongang.co.kr", &["#article_body", ".article_body", "article"]),
    ("hankyung.com", &[".article-body", ".newsView", "article"]),
    ("mk.co.kr", &[".news_cnt_detail_wrap", ".art_txt", "article"]),
    ("sedaily.com", &[".article_view", ".txt_area", "article"]),
    ("hani.co.kr", &[".article-text", ".text", "article"]),
    ("khan.co.kr", &[".art_body", ".article_body", "article"]),
    ("sbs.co.kr", &[".text_area", "article", ".article_cont"]),
    ("kbs.co.kr", &[".article-body", "#cont_newstext", "article"]),
    ("imbc.com", &[".news-view-con", ".view_con", "article"]),
    ("jtbc.co.kr", &[".article_content", "article", ".article_body"]),
    ("ytn.co.kr", &[".article-txt", "#CmAdContent", "article"]),
    ("etnews.com", &[".article_txt", ".article_body", "article"]),
    ("dt.co.kr", &[".article_view", "article"]),
    ("ajunews.com", &[".article_txt_content", "article"]),
    ("news1.kr", &[".article-body", "article"]),
    ("heraldcorp.com", &[".article_view", "article"]),
    ("mt.co.kr", &[".view_con", "article"]),
];

/// Generic selectors tried after (or without) a domain match.
const DEFAULT_SELECTORS: &[&str] = &[
    "article",
    r#"[itemprop="articleBody"]"#,
    ".article-body",
    ".article_body",
    ".article-content",
    ".article_content",
    ".news-content",
    ".news_content",
    "#articleBody",
    "#article_body",
    ".content",
];

/// Elements whose subtree never belongs to the article text.
const JUNK_TAGS: &[&str] = &[
    "script", "style", "iframe", "noscript", "aside", "nav", "header", "footer",
];

const JUNK_CLASS_TOKENS: &[&str] = &[
    "ad",
    "advertisement",
    "related-article",
    "copyright",
    "share-buttons",
    "social-share",
];

// ---------------------------------------------------------------------------
// Scraper
// ---------------------------------------------------------------------------

/// HTML article scraper with per-publisher selectors and length bounds.
pub struct ArticleScraper {
    http: Client,
    max_chars: usize,
    min_chars: usize,
}

impl ArticleScraper {
    pub fn new(timeout: Duration, max_chars: usize, min_chars: usize) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .context("Failed to build HTTP client for article scraping")?;

        Ok(Self {
            http,
            max_chars,
            min_chars,
        })
    }

    /// Fetch a news page and extract its article text.
    pub async fn scrape(&self, url: &str) -> Result<String, HeraldError> {
        debug!(url, "Scraping article body");

        let resp = self
            .http
            .get(url)
            .header("Accept", ACCEPT_HTML)
            .header("Accept-Language", ACCEPT_LANG_KO)
            .send()
            .await
            .map_err(|e| HeraldError::source_fetch(host_of(url).unwrap_or("scraper"), e))?;

        if !resp.status().is_success() {
            return Err(HeraldError::source_fetch(
                host_of(url).unwrap_or("scraper"),
                format!("HTTP {}", resp.status()),
            ));
        }

        let html = resp
            .text()
            .await
            .map_err(|e| HeraldError::source_fetch(host_of(url).unwrap_or("scraper"), e))?;

        let content = self.extract_content(&html, url)?;
        debug!(url, chars = content.chars().count(), "Article body extracted");
        Ok(content)
    }

    // -- Internal helpers ------------------------------------------------

    /// Selector-loop extraction: first candidate that yields enough text
    /// wins; the whole `<body>` is the last resort.
    fn extract_content(&self, html: &str, url: &str) -> Result<String, HeraldError> {
        let document = Html::parse_document(html);

        for selector_str in selectors_for(url) {
            let Ok(selector) = Selector::parse(selector_str) else {
                continue;
            };
            let Some(element) = document.select(&selector).next() else {
                continue;
            };

            let mut buf = String::new();
            collect_text(&mut buf, element);
            let content = collapse_whitespace(&buf);

            // Short hits are navigation shells, not the article; keep
            // trying more generic selectors.
            if content.chars().count() >= self.min_chars {
                return Ok(truncate_chars(&content, self.max_chars));
            }
        }

        let body_text = Selector::parse("body")
            .ok()
            .and_then(|sel| document.select(&sel).next())
            .map(|body| {
                let mut buf = String::new();
                collect_text(&mut buf, body);
                collapse_whitespace(&buf)
            })
            .unwrap_or_default();

        let length = body_text.chars().count();
        if length < self.min_chars {
            return Err(HeraldError::ContentTooShort {
                length,
                minimum: self.min_chars,
            });
        }

        Ok(truncate_chars(&body_text, self.max_chars))
    }
}

/// Selector candidates for a URL: domain-specific first, generic after.
fn selectors_for(url: &str) -> Vec<&'static str> {
    let mut selectors = Vec::new();
    if let Some(host) = host_of(url) {
        for (domain, domain_selectors) in DOMAIN_SELECTORS {
            if host.contains(domain) {
                selectors.extend_from_slice(domain_selectors);
                break;
            }
        }
    }
    selectors.extend_from_slice(DEFAULT_SELECTORS);
    selectors
}

fn host_of(url: &str) -> Option<&str> {
    let rest = url.split_once("://").map(|(_, rest)| rest)?;
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.rsplit('@').next()?;
    let host = host.split(':').next()?;
    (!host.is_empty()).then_some(host)
}

/// Whether an element's subtree is boilerplate (ads, nav, scripts).
fn is_junk(element: &scraper::node::Element) -> bool {
    if JUNK_TAGS.contains(&element.name()) {
        return true;
    }

    let class_attr = element.attr("class").unwrap_or_default().to_lowercase();
    if class_attr
        .split_whitespace()
        .any(|token| JUNK_CLASS_TOKENS.contains(&token))
    {
        return true;
    }
    if class_attr.contains("ad-") || class_attr.contains("banner") {
        return true;
    }

    let id_attr = element.attr("id").unwrap_or_default().to_lowercase();
    id_attr.contains("ad-") || id_attr.contains("banner")
}

/// Append the element's text, skipping junk subtrees.
fn collect_text(buf: &mut String, element: ElementRef<'_>) {
    if is_junk(element.value()) {
        return;
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                buf.push_str(text);
                buf.push(' ');
            }
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(buf, child_element);
                }
            }
            _ => {}
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
