//! HTTP API server.
//!
//! One Axum router serves the aggregation, search, summarization and
//! market endpoints. CORS is open so browser clients can call the API
//! from any origin.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use routes::AppState;

/// Bind the listener and serve until a shutdown signal arrives.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;
    info!(port, "API server listening on http://localhost:{port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install shutdown signal handler");
        return;
    }
    info!("Shutdown signal received, draining connections");
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin("*".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // News aggregation
        .route("/api/news/latest", get(routes::latest_news))
        .route("/api/news/topics/:category", get(routes::topic_news))
        .route("/api/news/breaking", get(routes::breaking_news))
        .route("/api/news/search", get(routes::search_news))
        // AI summarization
        .route("/api/news/summarize", post(routes::summarize_news))
        .route(
            "/api/news/summarize/stream",
            post(routes::summarize_news_stream),
        )
        // Market snapshots
        .route("/api/markets/trending", get(routes::trending_stocks))
        .route("/api/markets/economy", get(routes::economy_indicators))
        // Liveness
        .route("/api/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
