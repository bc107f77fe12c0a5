//! RSS feed fetcher for Korean news outlets.
//!
//! One `RssFetcher` per registry entry. Feeds are RSS 2.0 with the usual
//! Korean-publisher quirks: bare ampersands in link query strings, CDATA
//! descriptions full of markup, `dc:date` instead of `pubDate`, and one
//! outlet that stamps KST wall-clock time with a GMT label.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{clean_text, summarize_field, FeedSpec, NewsSource};
use crate::types::{HeraldError, NewsCategory, NewsItem};

// ---------------------------------------------------------------------------
// Feed document types (RSS XML → Rust)
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

/// One `<item>`. Only the fields we map are deserialized; everything
/// else in the element is ignored.
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "dc:date")]
    dc_date: Option<String>,
    #[serde(rename = "content:encoded")]
    content_encoded: Option<String>,
    #[serde(rename = "enclosure", default)]
    enclosures: Vec<Enclosure>,
    #[serde(rename = "media:content", default)]
    media_content: Vec<MediaRef>,
    #[serde(rename = "media:thumbnail", default)]
    media_thumbnail: Vec<MediaRef>,
}

#[derive(Debug, Deserialize)]
struct Enclosure {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "@type")]
    mime: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaRef {
    #[serde(rename = "@url")]
    url: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse helpers
// ---------------------------------------------------------------------------

/// Escape bare ampersands so strict XML parsing survives Korean feeds.
///
/// Already-escaped entities pass through untouched; quick-xml decodes
/// `&amp;` back to `&` during text extraction, so escaped ampersands
/// round-trip.
pub(super) fn scrub_xml_entities(xml: &str) -> String {
    static RE_ENTITY: OnceCell<Regex> = OnceCell::new();
    let re_entity = RE_ENTITY.get_or_init(|| {
        Regex::new(r"^(?:[a-zA-Z][a-zA-Z0-9]{1,31}|#[0-9]{1,7}|#x[0-9a-fA-F]{1,6});").unwrap()
    });

    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 1..];
        if re_entity.is_match(tail) {
            out.push('&');
        } else {
            out.push_str("&amp;");
        }
        rest = tail;
    }
    out.push_str(rest);
    out
}

/// Resolve an item's publication instant.
///
/// Precedence is `dc:date` over `pubDate` (callers pass the winner in);
/// unparseable or absent dates fall back to now, KST-labeled-GMT feeds
/// are shifted back 9 hours, and anything more than an hour in the
/// future is treated as clock skew and clamped to now.
pub(super) fn parse_published(raw: Option<&str>, kst_labeled_gmt: bool) -> DateTime<Utc> {
    let now = Utc::now();
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return now;
    };

    let parsed = DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc));

    let mut published = match parsed {
        Ok(dt) => dt,
        Err(_) => return now,
    };

    if kst_labeled_gmt {
        published -= chrono::Duration::hours(9);
    }

    if published > now + chrono::Duration::hours(1) {
        return now;
    }

    published
}

/// First `<img src>` inside an HTML fragment.
fn first_img_src(html: &str) -> Option<String> {
    static RE_IMG: OnceCell<Regex> = OnceCell::new();
    let re_img = RE_IMG
        .get_or_init(|| Regex::new(r#"(?is)<img[^>]+src\s*=\s*["']([^"']+)["']"#).unwrap());
    re_img
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Thumbnail resolution order: enclosure, media:content,
/// media:thumbnail, then the first inline `<img>` in the body HTML.
fn pick_image(item: &Item) -> Option<String> {
    if let Some(enclosure) = item.enclosures.iter().find(|e| {
        e.url.is_some() && e.mime.as_deref().map_or(true, |mime| mime.starts_with("image"))
    }) {
        return enclosure.url.clone();
    }
    if let Some(url) = item.media_content.iter().find_map(|m| m.url.clone()) {
        return Some(url);
    }
    if let Some(url) = item.media_thumbnail.iter().find_map(|m| m.url.clone()) {
        return Some(url);
    }
    let html = item
        .content_encoded
        .as_deref()
        .or(item.description.as_deref())?;
    first_img_src(html)
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Fetcher for a single registry feed.
pub struct RssFetcher {
    http: Client,
    spec: &'static FeedSpec,
}

impl RssFetcher {
    /// Wrap one registry entry. The HTTP client is shared across
    /// fetchers (reqwest clients are cheap to clone).
    pub fn new(http: Client, spec: &'static FeedSpec) -> Self {
        Self { http, spec }
    }

    /// Fetchers for every enabled feed, in fan-out order.
    pub fn for_all_feeds(http: &Client) -> Vec<RssFetcher> {
        super::all_feeds()
            .map(|spec| RssFetcher::new(http.clone(), spec))
            .collect()
    }

    /// Fetchers for one category's feeds, in fan-out order.
    pub fn for_category(http: &Client, category: NewsCategory) -> Vec<RssFetcher> {
        super::category_feeds(category)
            .map(|spec| RssFetcher::new(http.clone(), spec))
            .collect()
    }

    /// Parse a feed body into normalized items.
    ///
    /// Items without a link or a non-empty title are dropped; they can
    /// be neither deduplicated nor displayed.
    fn parse_feed(&self, body: &str) -> Result<Vec<NewsItem>, HeraldError> {
        let scrubbed = scrub_xml_entities(body);
        let rss: Rss = quick_xml::de::from_str(&scrubbed)
            .map_err(|e| HeraldError::source_fetch(self.spec.name, format!("XML parse: {e}")))?;

        let mut out = Vec::with_capacity(rss.channel.items.len());
        for item in &rss.channel.items {
            let Some(link) = item.link.as_deref().map(str::trim).filter(|l| !l.is_empty())
            else {
                continue;
            };
            let title = clean_text(item.title.as_deref().unwrap_or_default());
            if title.is_empty() {
                continue;
            }

            let published_at = parse_published(
                item.dc_date.as_deref().or(item.pub_date.as_deref()),
                self.spec.kst_labeled_gmt,
            );

            out.push(NewsItem {
                id: NewsItem::stable_id(link),
                title,
                url: link.to_string(),
                summary: summarize_field(item.description.as_deref().unwrap_or_default()),
                source: self.spec.name.to_string(),
                category: self.spec.category,
                published_at,
                image_url: pick_image(item),
                is_breaking: self.spec.category == NewsCategory::Breaking,
                ai_summary: None,
                ai_keywords: None,
                ai_summarized_at: None,
                ai_provider: None,
            });
        }

        Ok(out)
    }
}

#[async_trait]
impl NewsSource for RssFetcher {
    async fn fetch(&self) -> Result<Vec<NewsItem>, HeraldError> {
        debug!(feed = self.spec.name, url = self.spec.url, "Fetching RSS feed");

        let resp = self
            .http
            .get(self.spec.url)
            .send()
            .await
            .map_err(|e| HeraldError::source_fetch(self.spec.name, e))?;

        if !resp.status().is_success() {
            return Err(HeraldError::source_fetch(
                self.spec.name,
                format!("HTTP {}", resp.status()),
            ));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| HeraldError::source_fetch(self.spec.name, e))?;

        let items = self.parse_feed(&body)?;
        debug!(feed = self.spec.name, count = items.len(), "RSS feed parsed");
        Ok(items)
    }

    fn category(&self) -> NewsCategory {
        self.spec.category
    }

    fn name(&self) -> &str {
        self.spec.name
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    static GENERAL_SPEC: FeedSpec = FeedSpec {
        name: "테스트일보",
        category: NewsCategory::General,
        url: "https://rss.test.example/total.xml",
        priority: 7,
        enabled: true,
        kst_labeled_gmt: false,
    };

    static BREAKING_SPEC: FeedSpec = FeedSpec {
        name: "테스트 속보",
        category: NewsCategory::Breaking,
        url: "https://rss.test.example/breaking.xml",
        priority: 10,
        enabled: true,
        kst_labeled_gmt: false,
    };

    fn fetcher(spec: &'static FeedSpec) -> RssFetcher {
        RssFetcher::new(Client::new(), spec)
    }

    const FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>테스트일보 전체뉴스</title>
    <link>https://news.test.example</link>
    <item>
      <title><![CDATA[<b>삼성전자</b> 2분기 실적&nbsp;발표]]></title>
      <link>https://news.test.example/article/1?a=1&b=2</link>
      <description><![CDATA[<p>삼성전자가 2분기 잠정 실적을 발표했다. <img src="https://img.test.example/1.jpg"/></p>]]></description>
      <pubDate>Mon, 17 Aug 2026 09:30:00 +0900</pubDate>
    </item>
    <item>
      <title>국회, 예산안 처리</title>
      <link>https://news.test.example/article/2</link>
      <description>여야가 예산안에 합의했다.</description>
      <pubDate>Mon, 17 Aug 2026 01:00:00 GMT</pubDate>
      <enclosure url="https://img.test.example/2.jpg" type="image/jpeg"/>
      <media:thumbnail url="https://img.test.example/2-thumb.jpg"/>
    </item>
    <item>
      <title>링크 없는 항목</title>
      <description>버려져야 한다.</description>
    </item>
    <item>
      <title><![CDATA[<p></p>]]></title>
      <link>https://news.test.example/article/4</link>
      <description>제목이 비어 버려져야 한다.</description>
    </item>
  </channel>
</rss>"#;

    // -- Feed parsing tests --

    #[test]
    fn test_parse_feed_normalizes_items() {
        let items = fetcher(&GENERAL_SPEC).parse_feed(FIXTURE).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.title, "삼성전자 2분기 실적 발표");
        assert_eq!(first.url, "https://news.test.example/article/1?a=1&b=2");
        assert_eq!(first.source, "테스트일보");
        assert_eq!(first.category, NewsCategory::General);
        assert!(first.summary.starts_with("삼성전자가"));
        assert!(!first.is_breaking);
        assert_eq!(first.id, NewsItem::stable_id(&first.url));
    }

    #[test]
    fn test_parse_feed_drops_unusable_items() {
        // Items 3 (no link) and 4 (empty title after cleaning) are gone.
        let items = fetcher(&GENERAL_SPEC).parse_feed(FIXTURE).unwrap();
        assert!(items.iter().all(|i| !i.url.is_empty() && !i.title.is_empty()));
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_parse_feed_image_chain() {
        let items = fetcher(&GENERAL_SPEC).parse_feed(FIXTURE).unwrap();
        // First item: no enclosure, image comes from the inline <img>.
        assert_eq!(
            items[0].image_url.as_deref(),
            Some("https://img.test.example/1.jpg")
        );
        // Second item: enclosure wins over media:thumbnail.
        assert_eq!(
            items[1].image_url.as_deref(),
            Some("https://img.test.example/2.jpg")
        );
    }

    #[test]
    fn test_parse_feed_timezone_conversion() {
        let items = fetcher(&GENERAL_SPEC).parse_feed(FIXTURE).unwrap();
        // 09:30 +0900 is 00:30 UTC; 01:00 GMT stays 01:00 UTC.
        assert_eq!(items[0].published_at.to_rfc3339(), "2026-08-17T00:30:00+00:00");
        assert_eq!(items[1].published_at.to_rfc3339(), "2026-08-17T01:00:00+00:00");
    }

    #[test]
    fn test_parse_feed_breaking_flag() {
        let items = fetcher(&BREAKING_SPEC).parse_feed(FIXTURE).unwrap();
        assert!(items.iter().all(|i| i.is_breaking));
        assert!(items.iter().all(|i| i.category == NewsCategory::Breaking));
    }

    #[test]
    fn test_parse_feed_rejects_non_xml() {
        let err = fetcher(&GENERAL_SPEC).parse_feed("<html>점검 중</html>");
        assert!(err.is_err());
        assert!(format!("{}", err.unwrap_err()).contains("테스트일보"));
    }

    // -- Entity scrub tests --

    #[test]
    fn test_scrub_escapes_bare_ampersands() {
        assert_eq!(
            scrub_xml_entities("<link>https://e.com/?a=1&b=2</link>"),
            "<link>https://e.com/?a=1&amp;b=2</link>"
        );
    }

    #[test]
    fn test_scrub_keeps_valid_entities() {
        let xml = "<t>A &amp; B &#44032; &#x1F600; &lt;ok&gt;</t>";
        assert_eq!(scrub_xml_entities(xml), xml);
    }

    #[test]
    fn test_scrub_trailing_ampersand() {
        assert_eq!(scrub_xml_entities("a &"), "a &amp;");
    }

    // -- Date parsing tests --

    #[test]
    fn test_parse_published_rfc2822_and_rfc3339() {
        let rfc2822 = parse_published(Some("Mon, 17 Aug 2026 09:30:00 +0900"), false);
        assert_eq!(rfc2822.to_rfc3339(), "2026-08-17T00:30:00+00:00");

        let rfc3339 = parse_published(Some("2026-08-17T09:30:00+09:00"), false);
        assert_eq!(rfc3339, rfc2822);
    }

    #[test]
    fn test_parse_published_kst_labeled_gmt_shift() {
        // Feed says 09:30 GMT but means 09:30 KST, which is 00:30 UTC.
        let shifted = parse_published(Some("Mon, 17 Aug 2026 09:30:00 GMT"), true);
        assert_eq!(shifted.to_rfc3339(), "2026-08-17T00:30:00+00:00");
    }

    #[test]
    fn test_parse_published_future_clamped_to_now() {
        let future = (Utc::now() + chrono::Duration::hours(6)).to_rfc3339();
        let clamped = parse_published(Some(&future), false);
        assert!(clamped <= Utc::now());
    }

    #[test]
    fn test_parse_published_tolerates_garbage() {
        let before = Utc::now();
        let fallback = parse_published(Some("어제쯤"), false);
        assert!(fallback >= before);
        assert!(parse_published(None, false) >= before);
        assert!(parse_published(Some("   "), false) >= before);
    }

    // -- Image extraction tests --

    #[test]
    fn test_first_img_src_variants() {
        assert_eq!(
            first_img_src(r#"<p>x</p><IMG SRC="https://i.test/a.png" alt="">"#).as_deref(),
            Some("https://i.test/a.png")
        );
        assert_eq!(
            first_img_src(r#"<img class="x" src='https://i.test/b.png'>"#).as_deref(),
            Some("https://i.test/b.png")
        );
        assert!(first_img_src("<p>no image</p>").is_none());
    }
}
