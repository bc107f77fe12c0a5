//! Summarization pipeline: content acquisition, provider fallback,
//! persistence.
//!
//! Content policy: scrape the article body first; when scraping fails,
//! fall back to the RSS summary only if it carries enough text to
//! summarize. Requests with neither are rejected before any provider
//! spends tokens.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{article_request, run_with_fallback, AiProvider, GroqProvider};
use crate::config::AiConfig;
use crate::sources::article::ArticleScraper;
use crate::storage::NewsStore;
use crate::types::{HeraldError, StreamEvent, SummaryResult};

// ---------------------------------------------------------------------------
// Content policy
// ---------------------------------------------------------------------------

/// Provider input caps. Streaming summaries read the whole feed-out, so
/// they get more context; one-shot responses stay cheaper.
const STREAM_CONTENT_CHARS: usize = 3000;
const ONESHOT_CONTENT_CHARS: usize = 2000;

/// `contentSource` values surfaced to clients.
const CONTENT_SCRAPED: &str = "scraped";
const CONTENT_RSS_SUMMARY: &str = "summary";

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Outcome of a one-shot summarization, ready for the API envelope.
#[derive(Debug, Clone)]
pub struct Summarized {
    pub result: SummaryResult,
    pub provider: String,
    pub content_source: &'static str,
}

pub struct NewsSummarizer {
    providers: Vec<Arc<dyn AiProvider>>,
    streamer: Option<Arc<GroqProvider>>,
    scraper: Arc<ArticleScraper>,
    store: Option<Arc<NewsStore>>,
    ai: AiConfig,
    min_fallback_chars: usize,
}

impl NewsSummarizer {
    pub fn new(
        providers: Vec<Arc<dyn AiProvider>>,
        streamer: Option<Arc<GroqProvider>>,
        scraper: Arc<ArticleScraper>,
        store: Option<Arc<NewsStore>>,
        ai: AiConfig,
        min_fallback_chars: usize,
    ) -> Self {
        Self {
            providers,
            streamer,
            scraper,
            store,
            ai,
            min_fallback_chars,
        }
    }

    /// Summarize one article through the fallback chain.
    ///
    /// Persistence is fire-and-forget: a storage failure is logged and
    /// never surfaces to the caller.
    pub async fn summarize(
        &self,
        news_id: Option<&str>,
        title: &str,
        url: &str,
        rss_summary: &str,
    ) -> Result<Summarized, HeraldError> {
        let (content, content_source) = self
            .resolve_content(url, rss_summary, ONESHOT_CONTENT_CHARS)
            .await?;
        let request = article_request(title, &content, &self.ai);

        let outcome = run_with_fallback(&self.providers, &request).await?;
        info!(
            provider = %outcome.provider,
            content_source,
            keywords = outcome.result.keywords.len(),
            "Summary generated"
        );

        self.persist(news_id, &outcome.result, &outcome.provider);

        Ok(Summarized {
            result: outcome.result,
            provider: outcome.provider,
            content_source,
        })
    }

    /// Summarize one article as a token stream.
    ///
    /// Content resolution happens before the channel exists, so content
    /// failures return a plain `Err` the route can map to an HTTP error
    /// instead of a broken stream. The receiver yields `token` events
    /// followed by exactly one `done` or `error`; the channel closes when
    /// the producer task drops its sender.
    pub async fn summarize_stream(
        &self,
        news_id: Option<String>,
        title: String,
        url: String,
        rss_summary: String,
    ) -> Result<mpsc::UnboundedReceiver<StreamEvent>, HeraldError> {
        let Some(streamer) = self.streamer.clone() else {
            return Err(HeraldError::provider(
                "groq",
                "streaming provider not configured",
            ));
        };

        let (content, content_source) = self
            .resolve_content(&url, &rss_summary, STREAM_CONTENT_CHARS)
            .await?;
        let request = article_request(&title, &content, &self.ai);

        let (tx, rx) = mpsc::unbounded_channel();
        let store = self.store.clone();

        tokio::spawn(async move {
            let outcome = streamer
                .complete_stream(&request, |token| {
                    let _ = tx.send(StreamEvent::Token {
                        content: token.to_string(),
                    });
                })
                .await;

            match outcome {
                Ok(result) if result.is_valid() => {
                    info!(
                        provider = "groq",
                        content_source, "Streaming summary complete"
                    );
                    let _ = tx.send(StreamEvent::Done {
                        result: result.clone(),
                        provider: streamer.name().to_string(),
                        content_source: content_source.to_string(),
                    });
                    // The terminal event is already on the wire; storage
                    // only hears about the result after the fact.
                    if let (Some(store), Some(id)) = (store, news_id) {
                        if let Err(e) =
                            store.update_ai_summary(&id, &result, streamer.name()).await
                        {
                            warn!(id = %id, error = %e, "Failed to persist streamed summary");
                        }
                    }
                }
                Ok(_) => {
                    warn!("Streamed summary failed schema validation");
                    let _ = tx.send(StreamEvent::Error {
                        error: "schema validation failed: empty summary or keywords".to_string(),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Streaming summarization failed");
                    let _ = tx.send(StreamEvent::Error {
                        error: e.to_string(),
                    });
                }
            }
        });

        Ok(rx)
    }

    /// Writes back to storage without blocking the response path.
    fn persist(&self, news_id: Option<&str>, result: &SummaryResult, provider: &str) {
        let (Some(store), Some(id)) = (self.store.clone(), news_id) else {
            return;
        };
        let id = id.to_string();
        let result = result.clone();
        let provider = provider.to_string();
        tokio::spawn(async move {
            if let Err(e) = store.update_ai_summary(&id, &result, &provider).await {
                warn!(id = %id, error = %e, "Failed to persist AI summary");
            }
        });
    }

    async fn resolve_content(
        &self,
        url: &str,
        rss_summary: &str,
        cap: usize,
    ) -> Result<(String, &'static str), HeraldError> {
        let scraped = self.scraper.scrape(url).await;
        if let Err(e) = &scraped {
            debug!(url, error = %e, "Article scrape failed, considering RSS fallback");
        }
        choose_content(scraped, rss_summary, cap, self.min_fallback_chars)
    }
}

fn choose_content(
    scraped: Result<String, HeraldError>,
    rss_summary: &str,
    cap: usize,
    min_fallback_chars: usize,
) -> Result<(String, &'static str), HeraldError> {
    match scraped {
        Ok(text) => Ok((cap_chars(text, cap), CONTENT_SCRAPED)),
        Err(_) => {
            let fallback = rss_summary.trim();
            let length = fallback.chars().count();
            if length >= min_fallback_chars {
                Ok((cap_chars(fallback.to_string(), cap), CONTENT_RSS_SUMMARY))
            } else {
                Err(HeraldError::ContentTooShort {
                    length,
                    minimum: min_fallback_chars,
                })
            }
        }
    }
}

/// Caps by character count so multi-byte Korean text never splits
/// mid-character.
fn cap_chars(text: String, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use std::time::Duration;

    fn ai_config() -> AiConfig {
        AiConfig {
            providers: vec!["groq".to_string()],
            temperature: 0.3,
            max_tokens: 1024,
            groq: ProviderConfig {
                model: "llama-3.3-70b-versatile".to_string(),
                api_key_env: "HERALD_TEST_UNSET_GROQ".to_string(),
            },
            gemini: ProviderConfig {
                model: "gemini-2.5-flash".to_string(),
                api_key_env: "HERALD_TEST_UNSET_GEMINI".to_string(),
            },
            openrouter: ProviderConfig {
                model: "qwen/qwen3-30b-a3b:free".to_string(),
                api_key_env: "HERALD_TEST_UNSET_OPENROUTER".to_string(),
            },
        }
    }

    fn scrape_failure() -> Result<String, HeraldError> {
        Err(HeraldError::source_fetch("scraper", "connection refused"))
    }

    #[test]
    fn test_choose_content_prefers_scraped_body() {
        let (content, source) =
            choose_content(Ok("본문".repeat(40)), "요약", 2000, 100).unwrap();
        assert_eq!(source, "scraped");
        assert_eq!(content, "본문".repeat(40));
    }

    #[test]
    fn test_choose_content_caps_scraped_body() {
        let (content, _) = choose_content(Ok("가".repeat(50)), "", 10, 100).unwrap();
        assert_eq!(content.chars().count(), 10);
    }

    #[test]
    fn test_choose_content_falls_back_to_rss_summary() {
        let rss = "요".repeat(150);
        let (content, source) = choose_content(scrape_failure(), &rss, 2000, 100).unwrap();
        assert_eq!(source, "summary");
        assert_eq!(content, rss);
    }

    #[test]
    fn test_choose_content_accepts_fallback_at_exact_minimum() {
        let rss = "가".repeat(100);
        let (_, source) = choose_content(scrape_failure(), &rss, 2000, 100).unwrap();
        assert_eq!(source, "summary");
    }

    #[test]
    fn test_choose_content_rejects_short_fallback() {
        let rss = "가".repeat(99);
        let err = choose_content(scrape_failure(), &rss, 2000, 100).unwrap_err();
        match err {
            HeraldError::ContentTooShort { length, minimum } => {
                assert_eq!(length, 99);
                assert_eq!(minimum, 100);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_choose_content_trims_fallback_before_measuring() {
        let rss = format!("   {}   ", "가".repeat(99));
        let err = choose_content(scrape_failure(), &rss, 2000, 100).unwrap_err();
        assert!(matches!(err, HeraldError::ContentTooShort { length: 99, .. }));
    }

    #[test]
    fn test_cap_chars_counts_characters_not_bytes() {
        assert_eq!(cap_chars("가나다라".to_string(), 2), "가나");
        assert_eq!(cap_chars("가나".to_string(), 10), "가나");
        assert_eq!(cap_chars(String::new(), 10), "");
    }

    #[tokio::test]
    async fn test_short_rss_fallback_never_reaches_providers() {
        use crate::ai::MockAiProvider;

        let mut provider = MockAiProvider::new();
        provider.expect_complete().times(0);

        // Port 1 refuses the connection, so the scrape leg always fails.
        let scraper =
            Arc::new(ArticleScraper::new(Duration::from_secs(1), 3000, 100).unwrap());
        let summarizer = NewsSummarizer::new(
            vec![Arc::new(provider)],
            None,
            scraper,
            None,
            ai_config(),
            100,
        );

        let rss = "가".repeat(60);
        let err = summarizer
            .summarize(None, "제목", "http://127.0.0.1:1/", &rss)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HeraldError::ContentTooShort {
                length: 60,
                minimum: 100,
            }
        ));
    }

    #[tokio::test]
    async fn test_stream_requires_streaming_provider() {
        let scraper =
            Arc::new(ArticleScraper::new(Duration::from_secs(5), 3000, 100).unwrap());
        let summarizer =
            NewsSummarizer::new(Vec::new(), None, scraper, None, ai_config(), 100);

        let err = summarizer
            .summarize_stream(
                None,
                "제목".to_string(),
                "https://news.example.com/a".to_string(),
                String::new(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("streaming provider not configured"));
    }
}
