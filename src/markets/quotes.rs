//! Yahoo Finance index and FX quotes.
//!
//! Feeds the economy snapshot: Korean indices, major US/Japan indices,
//! and the USD/KRW rate, all from the public v8 chart endpoint.
//!
//! Endpoint: https://query1.finance.yahoo.com/v8/finance/chart/{symbol}
//! No auth; a browser-ish User-Agent avoids bot blocking.

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::{ChangeType, EconomySnapshot, HeraldError, Indicator};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// Yahoo symbols for every snapshot leg.
const SYM_KOSPI: &str = "^KS11";
const SYM_KOSDAQ: &str = "^KQ11";
const SYM_USD_KRW: &str = "KRW=X";
const SYM_SP500: &str = "^GSPC";
const SYM_NASDAQ: &str = "^IXIC";
const SYM_DOW: &str = "^DJI";
const SYM_NIKKEI: &str = "^N225";

// ---------------------------------------------------------------------------
// API response types (Yahoo chart JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    regular_market_price: Option<f64>,
    /// Present on index charts; `previous_close` is the fallback.
    #[serde(default)]
    chart_previous_close: Option<f64>,
    #[serde(default)]
    previous_close: Option<f64>,
}

/// Price and derived movement for one symbol.
#[derive(Debug, Clone, Copy)]
struct Quote {
    price: f64,
    change: f64,
    change_percent: f64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Yahoo Finance quote client for the economy snapshot.
pub struct YahooQuotesClient {
    http: Client,
}

impl YahooQuotesClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client for Yahoo Finance")?;

        Ok(Self { http })
    }

    /// Full snapshot with all legs fetched in parallel. A failed leg
    /// degrades to its placeholder indicator and never sinks the rest.
    pub async fn economy_snapshot(&self) -> EconomySnapshot {
        let (kospi, kosdaq, usd_krw, sp500, nasdaq, dow, nikkei) = tokio::join!(
            self.fetch_quote(SYM_KOSPI),
            self.fetch_quote(SYM_KOSDAQ),
            self.fetch_quote(SYM_USD_KRW),
            self.fetch_quote(SYM_SP500),
            self.fetch_quote(SYM_NASDAQ),
            self.fetch_quote(SYM_DOW),
            self.fetch_quote(SYM_NIKKEI),
        );

        EconomySnapshot {
            kospi: leg_indicator("KOSPI", kospi),
            kosdaq: leg_indicator("KOSDAQ", kosdaq),
            usd_krw: leg_indicator("USD/KRW", usd_krw),
            sp500: leg_indicator("S&P 500", sp500),
            nasdaq: leg_indicator("NASDAQ", nasdaq),
            dow: leg_indicator("Dow Jones", dow),
            nikkei: leg_indicator("Nikkei 225", nikkei),
            last_updated: Utc::now(),
        }
    }

    // -- Internal helpers ------------------------------------------------

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, HeraldError> {
        let url = format!("{CHART_URL}/{symbol}?interval=1d&range=1d");
        debug!(symbol, "Fetching Yahoo quote");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| HeraldError::source_fetch("Yahoo Finance", e))?;

        if !resp.status().is_success() {
            return Err(HeraldError::source_fetch(
                "Yahoo Finance",
                format!("HTTP {} for {symbol}", resp.status()),
            ));
        }

        let chart: ChartResponse = resp
            .json()
            .await
            .map_err(|e| HeraldError::source_fetch("Yahoo Finance", e))?;

        let meta = chart
            .chart
            .result
            .as_deref()
            .and_then(|results| results.first())
            .map(|r| &r.meta)
            .ok_or_else(|| {
                HeraldError::source_fetch("Yahoo Finance", format!("no chart data for {symbol}"))
            })?;

        let price = meta.regular_market_price;
        let previous_close = meta.chart_previous_close.or(meta.previous_close);
        let (Some(price), Some(previous_close)) = (price, previous_close) else {
            return Err(HeraldError::source_fetch(
                "Yahoo Finance",
                format!("incomplete quote for {symbol}"),
            ));
        };
        if previous_close == 0.0 {
            return Err(HeraldError::source_fetch(
                "Yahoo Finance",
                format!("zero previous close for {symbol}"),
            ));
        }

        let change = price - previous_close;
        Ok(Quote {
            price,
            change,
            change_percent: change / previous_close * 100.0,
        })
    }
}

/// Convert one leg's fetch result into a display indicator.
fn leg_indicator(name: &str, quote: Result<Quote, HeraldError>) -> Indicator {
    match quote {
        Ok(quote) => Indicator {
            name: name.to_string(),
            value: format_thousands(quote.price),
            change: signed_fixed(quote.change),
            change_percent: signed_fixed(quote.change_percent),
            change_type: change_type_of(quote.change),
        },
        Err(e) => {
            warn!(leg = name, error = %e, "Quote leg failed, serving placeholder");
            Indicator::missing(name)
        }
    }
}

fn change_type_of(change: f64) -> ChangeType {
    if change > 0.0 {
        ChangeType::Up
    } else if change < 0.0 {
        ChangeType::Down
    } else {
        ChangeType::Unchanged
    }
}

/// "2650.456" → "2,650.46"; always two fraction digits.
fn format_thousands(value: f64) -> String {
    let formatted = format!("{value:.2}");
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (formatted.as_str(), "00"),
    };
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}.{frac_part}")
}

/// Two fraction digits with an explicit sign; zero counts as positive.
fn signed_fixed(value: f64) -> String {
    if value >= 0.0 {
        format!("+{value:.2}")
    } else {
        format!("-{:.2}", value.abs())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
