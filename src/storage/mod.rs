//! Persistence layer.
//!
//! SQLite via sqlx. One `news` table holds every collected article,
//! keyed by URL: collection passes upsert into it, reads page out of
//! it, and a retention job prunes what has aged out.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::types::{HeraldError, NewsCategory, NewsItem, SummaryResult};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS news (
    id               TEXT PRIMARY KEY,
    title            TEXT NOT NULL,
    url              TEXT NOT NULL UNIQUE,
    summary          TEXT NOT NULL DEFAULT '',
    source           TEXT NOT NULL,
    category         TEXT NOT NULL,
    published_at     TEXT NOT NULL,
    image_url        TEXT,
    is_breaking      INTEGER NOT NULL DEFAULT 0,
    ai_summary       TEXT,
    ai_keywords      TEXT,
    ai_summarized_at TEXT,
    ai_provider      TEXT,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_news_published ON news (published_at DESC);
CREATE INDEX IF NOT EXISTS idx_news_category_published ON news (category, published_at DESC);
CREATE INDEX IF NOT EXISTS idx_news_breaking ON news (is_breaking, published_at DESC);
"#;

const SELECT_COLUMNS: &str = "id, title, url, summary, source, category, published_at, \
image_url, is_breaking, ai_summary, ai_keywords, ai_summarized_at, ai_provider";

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// SQLite-backed news store.
pub struct NewsStore {
    pool: SqlitePool,
}

impl NewsStore {
    /// Open (creating if needed) the database and ensure the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context(format!("Invalid SQLite database URL: {database_url}"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context(format!("Failed to open SQLite database at {database_url}"))?;

        let store = Self { pool };
        store.init_schema().await?;
        info!(database_url, "News store ready");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .context("Failed to initialise news schema")?;
        Ok(())
    }

    // -- Writes -----------------------------------------------------------

    /// Insert one article; on a URL collision only the volatile fields
    /// (title, summary, breaking flag) are refreshed so the original
    /// categorization and timestamps stay put.
    pub async fn upsert(&self, item: &NewsItem) -> Result<(), HeraldError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO news
                (id, title, url, summary, source, category, published_at,
                 image_url, is_breaking, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                title       = excluded.title,
                summary     = excluded.summary,
                is_breaking = excluded.is_breaking,
                updated_at  = excluded.updated_at
            "#,
        )
        .bind(&item.id)
        .bind(&item.title)
        .bind(&item.url)
        .bind(&item.summary)
        .bind(&item.source)
        .bind(item.category.to_string())
        .bind(item.published_at)
        .bind(item.image_url.as_deref())
        .bind(item.is_breaking)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    /// Persist a batch, skipping (and logging) individual failures.
    /// Returns how many rows were written.
    pub async fn save_batch(&self, items: &[NewsItem]) -> usize {
        let mut saved = 0;
        for item in items {
            match self.upsert(item).await {
                Ok(()) => saved += 1,
                Err(e) => warn!(url = %item.url, error = %e, "Failed to save article"),
            }
        }
        debug!(saved, total = items.len(), "Batch saved");
        saved
    }

    /// Attach an AI summary to an article.
    pub async fn update_ai_summary(
        &self,
        id: &str,
        result: &SummaryResult,
        provider: &str,
    ) -> Result<(), HeraldError> {
        let keywords = serde_json::to_string(&result.keywords)
            .map_err(|e| HeraldError::Storage(e.to_string()))?;

        let updated = sqlx::query(
            r#"
            UPDATE news SET
                ai_summary       = ?,
                ai_keywords      = ?,
                ai_summarized_at = ?,
                ai_provider      = ?,
                updated_at       = ?
            WHERE id = ?
            "#,
        )
        .bind(&result.summary)
        .bind(keywords)
        .bind(Utc::now())
        .bind(provider)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if updated.rows_affected() == 0 {
            return Err(HeraldError::NotFound(format!("news id {id}")));
        }
        Ok(())
    }

    /// Delete articles published before the retention cutoff.
    pub async fn prune_older_than(&self, days: i64) -> Result<u64, HeraldError> {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let result = sqlx::query("DELETE FROM news WHERE published_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        let removed = result.rows_affected();
        if removed > 0 {
            info!(removed, days, "Old news pruned");
        }
        Ok(removed)
    }

    // -- Reads ------------------------------------------------------------

    /// Newest articles across all categories, optionally restricted to
    /// a set of source names.
    pub async fn latest(
        &self,
        limit: i64,
        offset: i64,
        sources: &[String],
    ) -> Result<Vec<NewsItem>, HeraldError> {
        let rows = if sources.is_empty() {
            sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM news \
                 ORDER BY published_at DESC LIMIT ? OFFSET ?"
            ))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        } else {
            let placeholders = vec!["?"; sources.len()].join(", ");
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM news WHERE source IN ({placeholders}) \
                 ORDER BY published_at DESC LIMIT ? OFFSET ?"
            );
            let mut query = sqlx::query(&sql);
            for source in sources {
                query = query.bind(source);
            }
            query.bind(limit).bind(offset).fetch_all(&self.pool).await
        }
        .map_err(storage_err)?;

        rows.iter().map(row_to_item).collect()
    }

    /// Row count matching [`latest`](Self::latest) without pagination.
    pub async fn latest_count(&self, sources: &[String]) -> Result<u64, HeraldError> {
        let row = if sources.is_empty() {
            sqlx::query("SELECT COUNT(*) AS n FROM news")
                .fetch_one(&self.pool)
                .await
        } else {
            let placeholders = vec!["?"; sources.len()].join(", ");
            let sql = format!("SELECT COUNT(*) AS n FROM news WHERE source IN ({placeholders})");
            let mut query = sqlx::query(&sql);
            for source in sources {
                query = query.bind(source);
            }
            query.fetch_one(&self.pool).await
        }
        .map_err(storage_err)?;

        let n: i64 = row.try_get("n").map_err(storage_err)?;
        Ok(n as u64)
    }

    /// Newest articles in one category.
    pub async fn by_category(
        &self,
        category: NewsCategory,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NewsItem>, HeraldError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM news WHERE category = ? \
             ORDER BY published_at DESC LIMIT ? OFFSET ?"
        ))
        .bind(category.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter().map(row_to_item).collect()
    }

    pub async fn category_count(&self, category: NewsCategory) -> Result<u64, HeraldError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM news WHERE category = ?")
            .bind(category.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;

        let n: i64 = row.try_get("n").map_err(storage_err)?;
        Ok(n as u64)
    }

    /// Newest articles flagged as breaking.
    pub async fn breaking(&self, limit: i64) -> Result<Vec<NewsItem>, HeraldError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM news WHERE is_breaking = 1 \
             ORDER BY published_at DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter().map(row_to_item).collect()
    }

    /// Case-insensitive substring search over title and summary.
    pub async fn search(
        &self,
        keyword: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<NewsItem>, u64), HeraldError> {
        let pattern = format!("%{keyword}%");

        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM news \
             WHERE title LIKE ? OR summary LIKE ? \
             ORDER BY published_at DESC LIMIT ? OFFSET ?"
        ))
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let count_row =
            sqlx::query("SELECT COUNT(*) AS n FROM news WHERE title LIKE ? OR summary LIKE ?")
                .bind(&pattern)
                .bind(&pattern)
                .fetch_one(&self.pool)
                .await
                .map_err(storage_err)?;
        let total: i64 = count_row.try_get("n").map_err(storage_err)?;

        let items: Result<Vec<NewsItem>, HeraldError> = rows.iter().map(row_to_item).collect();
        Ok((items?, total as u64))
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<NewsItem>, HeraldError> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM news WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.as_ref().map(row_to_item).transpose()
    }

    /// Total stored articles (collection cycle reporting).
    pub async fn count(&self) -> Result<u64, HeraldError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM news")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        let n: i64 = row.try_get("n").map_err(storage_err)?;
        Ok(n as u64)
    }

    /// In-memory store for tests. One connection only: every
    /// `sqlite::memory:` connection is its own database.
    #[cfg(test)]
    pub(crate) async fn memory() -> NewsStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        let store = NewsStore { pool };
        store.init_schema().await.expect("schema init");
        store
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn storage_err(e: sqlx::Error) -> HeraldError {
    HeraldError::Storage(e.to_string())
}

fn row_to_item(row: &SqliteRow) -> Result<NewsItem, HeraldError> {
    let category_str: String = row.try_get("category").map_err(storage_err)?;
    let category = category_str
        .parse::<NewsCategory>()
        .map_err(|e| HeraldError::Storage(e.to_string()))?;

    let ai_keywords: Option<String> = row.try_get("ai_keywords").map_err(storage_err)?;
    let ai_keywords = ai_keywords.and_then(|raw| serde_json::from_str(&raw).ok());

    let published_at: DateTime<Utc> = row.try_get("published_at").map_err(storage_err)?;
    let ai_summarized_at: Option<DateTime<Utc>> =
        row.try_get("ai_summarized_at").map_err(storage_err)?;

    Ok(NewsItem {
        id: row.try_get("id").map_err(storage_err)?,
        title: row.try_get("title").map_err(storage_err)?,
        url: row.try_get("url").map_err(storage_err)?,
        summary: row.try_get("summary").map_err(storage_err)?,
        source: row.try_get("source").map_err(storage_err)?,
        category,
        published_at,
        image_url: row.try_get("image_url").map_err(storage_err)?,
        is_breaking: row.try_get("is_breaking").map_err(storage_err)?,
        ai_summary: row.try_get("ai_summary").map_err(storage_err)?,
        ai_keywords,
        ai_summarized_at,
        ai_provider: row.try_get("ai_provider").map_err(storage_err)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
