//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (AI provider API keys) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`; a missing key
//! disables that provider instead of failing startup.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::time::Duration;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub sources: SourcesConfig,
    pub search: SearchConfig,
    pub ai: AiConfig,
    pub scraper: ScraperConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub port: u16,
    /// Collection mode, fixed for the process lifetime.
    pub mode: ServiceMode,
    /// Interval of the background collection cycle (database mode only).
    #[serde(default = "default_collection_interval")]
    pub collection_interval_secs: u64,
}

/// Which collection strategy the service runs on.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    /// Serve from persisted storage, refreshed by a background cycle.
    Database,
    /// Fan out to the feeds on every request, no persistence.
    Realtime,
}

impl fmt::Display for ServiceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceMode::Database => write!(f, "database"),
            ServiceMode::Realtime => write!(f, "realtime"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub database_url: String,
    /// Items older than this are pruned by the collection cycle.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_search_max_results")]
    pub max_results: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    /// Provider fallback order. Providers whose API key env is unset
    /// are skipped at construction.
    pub providers: Vec<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    pub groq: ProviderConfig,
    pub gemini: ProviderConfig,
    pub openrouter: ProviderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub model: String,
    pub api_key_env: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScraperConfig {
    #[serde(default = "default_scraper_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    /// Content below this length is rejected rather than summarized.
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
}

fn default_collection_interval() -> u64 {
    300
}

fn default_cleanup_interval() -> u64 {
    300
}

fn default_retention_days() -> u32 {
    7
}

fn default_source_timeout() -> u64 {
    10
}

fn default_search_timeout() -> u64 {
    8
}

fn default_search_max_results() -> usize {
    30
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_scraper_timeout() -> u64 {
    10
}

fn default_max_content_chars() -> usize {
    3000
}

fn default_min_content_chars() -> usize {
    100
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.sources.timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search.timeout_secs)
    }

    pub fn scraper_timeout(&self) -> Duration {
        Duration::from_secs(self.scraper.timeout_secs)
    }
}
