//! HERALD — Korean news aggregation and summarization service
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the collection mode chosen in `config.toml`, and serves the
//! API until a shutdown signal arrives. In database mode a background
//! ingest cycle keeps the store fed.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use herald::ai::{self, NewsSummarizer};
use herald::cache::TtlCache;
use herald::collector::{
    CycleReport, DatabaseCollector, NewsCollector, NewsIngestor, RealtimeCollector,
};
use herald::config::{AppConfig, ServiceMode};
use herald::markets::{KrxClient, YahooQuotesClient};
use herald::search::{HybridSearch, HybridSearcher};
use herald::server;
use herald::server::routes::{ServiceState, SnapshotSlot};
use herald::sources::article::ArticleScraper;
use herald::sources::build_http_client;
use herald::sources::google_news::GoogleNewsClient;
use herald::storage::NewsStore;

const BANNER: &str = r#"
 _   _ _____ ____      _    _     ____
| | | | ____|  _ \    / \  | |   |  _ \
| |_| |  _| | |_) |  / _ \ | |   | | | |
|  _  | |___|  _ <  / ___ \| |___| |_| |
|_| |_|_____|_| \_\/_/   \_\_____|____/

  Korean News Aggregation & Summarization Service
  v0.1.0
"#;

/// KRX and Yahoo Finance are slow upstreams; give them a fixed budget
/// independent of the feed timeout.
const MARKET_TIMEOUT_SECS: u64 = 10;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        service = %cfg.service.name,
        mode = %cfg.service.mode,
        port = cfg.service.port,
        "HERALD starting up"
    );

    // -- Shared components -------------------------------------------------

    let cache = Arc::new(TtlCache::new());
    cache.spawn_cleanup(Duration::from_secs(cfg.cache.cleanup_interval_secs));

    let feed_http = build_http_client(cfg.source_timeout(), &cfg.sources.user_agent)?;
    let search_http = build_http_client(cfg.search_timeout(), &cfg.sources.user_agent)?;
    let searcher: Arc<dyn HybridSearch> = Arc::new(HybridSearcher::new(GoogleNewsClient::new(
        search_http,
        cfg.search.max_results,
    )));

    let scraper = Arc::new(ArticleScraper::new(
        cfg.scraper_timeout(),
        cfg.scraper.max_content_chars,
        cfg.scraper.min_content_chars,
    )?);

    let providers = ai::build_providers(&cfg.ai)?;
    if providers.is_empty() {
        warn!("No AI provider keys configured — summarization endpoints will fail");
    }
    let streamer = ai::build_streaming_provider(&cfg.ai)?;
    if streamer.is_none() {
        warn!("Groq key missing — streaming summarization disabled");
    }

    // -- Mode wiring -------------------------------------------------------

    let mut store: Option<Arc<NewsStore>> = None;
    let mut fallback: Option<Arc<dyn NewsCollector>> = None;
    let mut ingestor: Option<NewsIngestor> = None;

    let collector: Arc<dyn NewsCollector> = match cfg.service.mode {
        ServiceMode::Realtime => Arc::new(RealtimeCollector::new(feed_http.clone())),
        ServiceMode::Database => {
            let db = Arc::new(NewsStore::connect(&cfg.storage.database_url).await?);
            store = Some(Arc::clone(&db));
            fallback = Some(Arc::new(RealtimeCollector::new(feed_http.clone())));
            ingestor = Some(NewsIngestor::new(
                feed_http.clone(),
                Arc::clone(&db),
                cfg.storage.retention_days,
            ));
            Arc::new(DatabaseCollector::new(db, Arc::clone(&searcher)))
        }
    };

    let summarizer = Arc::new(NewsSummarizer::new(
        providers,
        streamer,
        scraper,
        store.clone(),
        cfg.ai.clone(),
        cfg.scraper.min_content_chars,
    ));

    let state = Arc::new(ServiceState {
        mode: cfg.service.mode,
        cache,
        collector,
        fallback,
        searcher,
        store,
        summarizer,
        krx: KrxClient::new(Duration::from_secs(MARKET_TIMEOUT_SECS))?,
        quotes: YahooQuotesClient::new(Duration::from_secs(MARKET_TIMEOUT_SECS))?,
        trending: SnapshotSlot::new(),
        economy: SnapshotSlot::new(),
        started_at: tokio::time::Instant::now(),
    });

    // -- Background ingest cycle (database mode) ---------------------------

    if let Some(ingestor) = ingestor {
        let interval = Duration::from_secs(cfg.service.collection_interval_secs);
        info!(
            interval_secs = cfg.service.collection_interval_secs,
            "Starting collection cycle"
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately, so the store is primed
            // before the first request arrives.
            loop {
                ticker.tick().await;
                let report = ingestor.collect_once().await;
                log_cycle_report(&report);
            }
        });
    }

    // -- Serve -------------------------------------------------------------

    server::serve(state, cfg.service.port).await?;

    info!("HERALD shut down cleanly.");
    Ok(())
}

/// Log a human-readable ingest cycle summary.
fn log_cycle_report(report: &CycleReport) {
    info!(
        fetched = report.fetched,
        saved = report.saved,
        pruned = report.pruned,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Collection cycle complete"
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("herald=info"));

    let json_logging = std::env::var("HERALD_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
