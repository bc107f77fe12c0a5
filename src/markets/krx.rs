//! KRX (Korea Exchange) trending stocks.
//!
//! One POST fetches the whole market's daily quotes; the top-10 tables
//! (volume, gainers, losers) are computed locally. KRX keys the query
//! on a trading date and returns an empty block on weekends and
//! holidays, so the client steps back day by day until it finds one.
//!
//! Endpoint: http://data.krx.co.kr/comm/bldAttendant/getJsonData.cmd
//! No auth; form-encoded POST, Korean locale.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::types::{ChangeType, HeraldError, TrendingStockItem, TrendingStocksData};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const KRX_URL: &str = "http://data.krx.co.kr/comm/bldAttendant/getJsonData.cmd";
const KRX_BLD: &str = "dbms/MDC/STAT/standard/MDCSTAT01501";
const USER_AGENT: &str = "Mozilla/5.0";

/// Rows per table.
const TABLE_SIZE: usize = 10;

/// How many calendar days to walk back looking for a trading day.
/// Seven covers the longest Korean holiday cluster.
const MAX_LOOKBACK_DAYS: i64 = 7;

/// Name fragments marking ETF/ETN/REIT/SPAC listings, which are noise
/// in a "trending stocks" view.
const NON_STOCK_KEYWORDS: &[&str] = &[
    "KODEX", "TIGER", "KBSTAR", "ARIRANG", "HANARO", "SOL", "KINDEX", "KOSEF", "SMART",
    "TIMEFOLIO", "ACE", "BNK", "FOCUS", "WOORI", "PLUS", "TREX", "VITA", "MIRAE", "TRUE",
    "RISE", "QV", "NH", "스팩", "리츠", "SPAC",
];

// ---------------------------------------------------------------------------
// API response types (KRX JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct KrxResponse {
    #[serde(rename = "OutBlock_1", default)]
    rows: Vec<KrxRow>,
}

/// One listing's daily quote. All values arrive as display strings
/// ("81,200", "-1.50") and stay strings on the wire.
#[derive(Debug, Clone, Deserialize)]
struct KrxRow {
    #[serde(rename = "ISU_SRT_CD")]
    code: String,
    #[serde(rename = "ISU_ABBRV")]
    name: String,
    #[serde(rename = "TDD_CLSPRC")]
    close_price: String,
    #[serde(rename = "CMPPREVDD_PRC")]
    change: String,
    #[serde(rename = "FLUC_RT")]
    change_rate: String,
    /// "1" up, "2" down, anything else flat.
    #[serde(rename = "FLUC_TP_CD")]
    direction: String,
    #[serde(rename = "ACC_TRDVOL")]
    volume: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// KRX daily-quotes client.
pub struct KrxClient {
    http: Client,
}

impl KrxClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client for KRX")?;

        Ok(Self { http })
    }

    /// Top-10 tables for the most recent trading day.
    pub async fn trending_stocks(&self) -> Result<TrendingStocksData, HeraldError> {
        let today = kst_today();

        for days_back in 0..MAX_LOOKBACK_DAYS {
            let date = today - chrono::Duration::days(days_back);
            let rows = self.fetch_all_stocks(date).await?;
            if rows.is_empty() {
                debug!(%date, "KRX returned no rows, stepping back a day");
                continue;
            }

            info!(%date, listings = rows.len(), "KRX daily quotes fetched");
            return Ok(build_tables(rows));
        }

        Err(HeraldError::source_fetch(
            "KRX",
            format!("no trading data within {MAX_LOOKBACK_DAYS} days"),
        ))
    }

    // -- Internal helpers ------------------------------------------------

    async fn fetch_all_stocks(&self, date: NaiveDate) -> Result<Vec<KrxRow>, HeraldError> {
        let trd_dd = date.format("%Y%m%d").to_string();
        let params = [
            ("bld", KRX_BLD),
            ("locale", "ko_KR"),
            ("mktId", "ALL"),
            ("trdDd", trd_dd.as_str()),
            ("share", "1"),
            ("money", "1"),
            ("csvxls_is498", "false"),
        ];

        let resp = self
            .http
            .post(KRX_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| HeraldError::source_fetch("KRX", e))?;

        if !resp.status().is_success() {
            return Err(HeraldError::source_fetch(
                "KRX",
                format!("HTTP {}", resp.status()),
            ));
        }

        let body: KrxResponse = resp
            .json()
            .await
            .map_err(|e| HeraldError::source_fetch("KRX", e))?;

        Ok(body.rows)
    }
}

/// KRX trades on KST dates; the UTC date lags it by nine hours.
fn kst_today() -> NaiveDate {
    (Utc::now() + chrono::Duration::hours(9)).date_naive()
}

// ---------------------------------------------------------------------------
// Table construction
// ---------------------------------------------------------------------------

fn build_tables(rows: Vec<KrxRow>) -> TrendingStocksData {
    let stocks: Vec<KrxRow> = rows
        .into_iter()
        .filter(|row| {
            !is_non_stock(&row.name)
                && parse_number(&row.volume) > 0.0
                && parse_number(&row.close_price) > 0.0
        })
        .collect();

    let mut by_volume = stocks.clone();
    by_volume.sort_by(|a, b| parse_number(&b.volume).total_cmp(&parse_number(&a.volume)));
    let by_volume = rank_rows(by_volume);

    let mut gainers: Vec<KrxRow> = stocks
        .iter()
        .filter(|row| row.direction == "1")
        .cloned()
        .collect();
    gainers.sort_by(|a, b| parse_number(&b.change_rate).total_cmp(&parse_number(&a.change_rate)));
    let gainers = rank_rows(gainers);

    let mut losers: Vec<KrxRow> = stocks
        .iter()
        .filter(|row| row.direction == "2")
        .cloned()
        .collect();
    losers.sort_by(|a, b| parse_number(&a.change_rate).total_cmp(&parse_number(&b.change_rate)));
    let losers = rank_rows(losers);

    TrendingStocksData {
        by_volume,
        gainers,
        losers,
        last_updated: Utc::now(),
    }
}

fn rank_rows(rows: Vec<KrxRow>) -> Vec<TrendingStockItem> {
    rows.into_iter()
        .take(TABLE_SIZE)
        .enumerate()
        .map(|(i, row)| to_trending_item(row, (i + 1) as u32))
        .collect()
}

fn to_trending_item(row: KrxRow, rank: u32) -> TrendingStockItem {
    let change_type = match row.direction.as_str() {
        "1" => ChangeType::Up,
        "2" => ChangeType::Down,
        _ => ChangeType::Unchanged,
    };
    let sign = match change_type {
        ChangeType::Up => "+",
        ChangeType::Down => "-",
        ChangeType::Unchanged => "",
    };

    TrendingStockItem {
        rank,
        code: row.code,
        name: row.name,
        price: row.close_price,
        change: apply_sign(&row.change, sign),
        change_percent: apply_sign(&row.change_rate, sign),
        change_type,
        volume: row.volume,
    }
}

/// Prefix the direction sign unless the value already carries one.
fn apply_sign(display: &str, sign: &str) -> String {
    if sign.is_empty() || display.starts_with('-') || display.starts_with('+') {
        display.to_string()
    } else {
        format!("{sign}{display}")
    }
}

/// "12,345,678" → 12345678.0; unparseable values count as zero.
fn parse_number(display: &str) -> f64 {
    display.replace(',', "").parse().unwrap_or(0.0)
}

fn is_non_stock(name: &str) -> bool {
    NON_STOCK_KEYWORDS.iter().any(|kw| name.contains(kw))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, price: &str, rate: &str, direction: &str, volume: &str) -> KrxRow {
        KrxRow {
            code: "005930".to_string(),
            name: name.to_string(),
            close_price: price.to_string(),
            change: "1,200".to_string(),
            change_rate: rate.to_string(),
            direction: direction.to_string(),
            volume: volume.to_string(),
        }
    }

    // -- Number parsing tests --

    #[test]
    fn test_parse_number_strips_commas() {
        assert_eq!(parse_number("12,345,678"), 12_345_678.0);
        assert_eq!(parse_number("-1.50"), -1.50);
        assert_eq!(parse_number("81,200"), 81_200.0);
        assert_eq!(parse_number("-"), 0.0);
    }

    // -- Listing filter tests --

    #[test]
    fn test_is_non_stock() {
        assert!(is_non_stock("KODEX 200"));
        assert!(is_non_stock("TIGER 미국나스닥100"));
        assert!(is_non_stock("삼성스팩8호"));
        assert!(is_non_stock("신한알파리츠"));
        assert!(!is_non_stock("삼성전자"));
        assert!(!is_non_stock("카카오"));
    }

    // -- Sign handling tests --

    #[test]
    fn test_apply_sign() {
        // Unsigned payloads get the direction sign.
        assert_eq!(apply_sign("1.50", "+"), "+1.50");
        assert_eq!(apply_sign("1.50", "-"), "-1.50");
        // Already-signed payloads pass through untouched.
        assert_eq!(apply_sign("-1.50", "-"), "-1.50");
        assert_eq!(apply_sign("+1.50", "+"), "+1.50");
        // Flat listings carry no sign.
        assert_eq!(apply_sign("0.00", ""), "0.00");
    }

    #[test]
    fn test_to_trending_item_direction() {
        let up = to_trending_item(row("삼성전자", "81,200", "1.50", "1", "12,345,678"), 1);
        assert_eq!(up.change_type, ChangeType::Up);
        assert_eq!(up.change_percent, "+1.50");
        assert_eq!(up.change, "+1,200");

        let down = to_trending_item(row("카카오", "48,550", "-2.10", "2", "9,000,000"), 2);
        assert_eq!(down.change_type, ChangeType::Down);
        assert_eq!(down.change_percent, "-2.10");

        let flat = to_trending_item(row("한국전력", "21,000", "0.00", "3", "1,000"), 3);
        assert_eq!(flat.change_type, ChangeType::Unchanged);
        assert_eq!(flat.change_percent, "0.00");
    }

    // -- Table construction tests --

    #[test]
    fn test_build_tables_filters_and_ranks() {
        let rows = vec![
            row("삼성전자", "81,200", "1.50", "1", "12,345,678"),
            row("카카오", "48,550", "-2.10", "2", "9,000,000"),
            row("NAVER", "210,000", "3.20", "1", "2,000,000"),
            row("KODEX 200", "35,000", "0.90", "1", "99,999,999"),
            row("서울식품", "250", "8.70", "1", "50,000,000"),
            row("한화오션", "30,100", "-5.40", "2", "7,500,000"),
            row("거래정지주", "5,000", "0.00", "3", "0"),
        ];

        let tables = build_tables(rows);

        // ETF and zero-volume listings never rank.
        assert!(tables.by_volume.iter().all(|i| i.name != "KODEX 200"));
        assert!(tables.by_volume.iter().all(|i| i.name != "거래정지주"));

        // Volume table is descending with ranks assigned from 1.
        assert_eq!(tables.by_volume[0].name, "서울식품");
        assert_eq!(tables.by_volume[0].rank, 1);
        assert_eq!(tables.by_volume[1].name, "삼성전자");
        assert_eq!(tables.by_volume[1].rank, 2);

        // Gainers: direction "1" only, highest rate first.
        let gainer_names: Vec<&str> =
            tables.gainers.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(gainer_names, vec!["서울식품", "NAVER", "삼성전자"]);

        // Losers: direction "2" only, most negative rate first.
        let loser_names: Vec<&str> = tables.losers.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(loser_names, vec!["한화오션", "카카오"]);
    }

    #[test]
    fn test_build_tables_caps_at_ten() {
        let rows: Vec<KrxRow> = (0..25)
            .map(|i| {
                row(
                    &format!("종목{i}"),
                    "10,000",
                    &format!("{}.00", i % 9 + 1),
                    "1",
                    &format!("{}", (i + 1) * 1000),
                )
            })
            .collect();

        let tables = build_tables(rows);
        assert_eq!(tables.by_volume.len(), 10);
        assert_eq!(tables.gainers.len(), 10);
        assert!(tables.losers.is_empty());
    }

    #[test]
    fn test_kst_today_is_ahead_of_utc_date() {
        // KST date equals or leads the UTC date, never trails it.
        let utc_date = Utc::now().date_naive();
        let kst = kst_today();
        assert!(kst == utc_date || kst == utc_date + chrono::Duration::days(1));
    }

    // -- Response parsing tests --

    #[test]
    fn test_krx_response_parses() {
        let json = r#"{
            "OutBlock_1": [{
                "ISU_SRT_CD": "005930",
                "ISU_ABBRV": "삼성전자",
                "TDD_CLSPRC": "81,200",
                "CMPPREVDD_PRC": "1,200",
                "FLUC_RT": "1.50",
                "FLUC_TP_CD": "1",
                "ACC_TRDVOL": "12,345,678",
                "ACC_TRDVAL": "1,002,345,678,900",
                "MKTCAP": "484,000,000,000,000"
            }],
            "CURRENT_DATETIME": "2026.08.20 PM 03:40:12"
        }"#;
        let parsed: KrxResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].code, "005930");
        assert_eq!(parsed.rows[0].name, "삼성전자");
    }

    #[test]
    fn test_krx_response_tolerates_missing_block() {
        let parsed: KrxResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.rows.is_empty());
    }
}
