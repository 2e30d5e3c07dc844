use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use sp_core::{
    ArticleQueue, Error, PendingArticle, QueuedArticle, Result, UserWatchlist, WatchRegistry,
    WatchlistStream,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteRow};
use sqlx::Row;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        email TEXT PRIMARY KEY,
        companies TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS queued_articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT,
        body TEXT NOT NULL,
        published TEXT,
        email TEXT NOT NULL,
        company TEXT NOT NULL,
        conditions TEXT NOT NULL,
        queued_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    )
    "#,
];

fn db_error(e: sqlx::Error) -> Error {
    Error::Storage(e.to_string())
}

pub struct SQLiteStorage {
    pool: Arc<SqlitePool>,
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::connect(&format!("sqlite:{}", db_path.display())).await
    }

    /// Registry reads stream while the pipeline writes on other pooled
    /// connections, so the database runs in WAL mode where readers never
    /// block commits.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(db_error)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(10));
        let pool = SqlitePool::connect_with(options).await.map_err(db_error)?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Storage(format!("Failed to run migration {}: {}", i, e)))?;
        }

        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

fn decode_watchlist(row: &SqliteRow) -> Result<UserWatchlist> {
    let email: String = row.try_get("email").map_err(db_error)?;
    let companies: String = row.try_get("companies").map_err(db_error)?;
    Ok(UserWatchlist {
        email,
        companies: serde_json::from_str(&companies)?,
    })
}

fn decode_queued(row: &SqliteRow) -> Result<QueuedArticle> {
    let conditions: String = row.try_get("conditions").map_err(db_error)?;
    let queued_at: String = row.try_get("queued_at").map_err(db_error)?;
    Ok(QueuedArticle {
        article: PendingArticle {
            title: row.try_get("title").map_err(db_error)?,
            body: row.try_get("body").map_err(db_error)?,
            published: row.try_get("published").map_err(db_error)?,
            email: row.try_get("email").map_err(db_error)?,
            company: row.try_get("company").map_err(db_error)?,
            conditions: serde_json::from_str(&conditions)?,
        },
        queued_at: parse_timestamp(&queued_at)?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("Invalid queued_at {:?}: {}", raw, e)))
}

#[async_trait]
impl WatchRegistry for SQLiteStorage {
    fn watchlists(&self) -> WatchlistStream<'_> {
        sqlx::query("SELECT email, companies FROM users ORDER BY email")
            .fetch(&*self.pool)
            .map(|row| decode_watchlist(&row.map_err(db_error)?))
            .boxed()
    }

    async fn save_watchlist(&self, watchlist: &UserWatchlist) -> Result<()> {
        let companies = serde_json::to_string(&watchlist.companies)?;
        sqlx::query(
            r#"
            INSERT INTO users (email, companies) VALUES (?, ?)
            ON CONFLICT(email) DO UPDATE SET companies = excluded.companies
            "#,
        )
        .bind(watchlist.email.clone())
        .bind(companies)
        .execute(&*self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}

#[async_trait]
impl ArticleQueue for SQLiteStorage {
    async fn enqueue(&self, article: PendingArticle) -> Result<QueuedArticle> {
        let conditions = serde_json::to_string(&article.conditions)?;
        let rows = sqlx::query(
            r#"
            INSERT INTO queued_articles (title, body, published, email, company, conditions)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING queued_at
            "#,
        )
        .bind(article.title.clone())
        .bind(article.body.clone())
        .bind(article.published.clone())
        .bind(article.email.clone())
        .bind(article.company.clone())
        .bind(conditions)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error)?;

        // fetch_all drives the statement to completion, so the row is committed
        let row = rows
            .first()
            .ok_or_else(|| Error::Storage("INSERT returned no row".to_string()))?;
        let queued_at: String = row.try_get("queued_at").map_err(db_error)?;
        Ok(QueuedArticle {
            article,
            queued_at: parse_timestamp(&queued_at)?,
        })
    }

    async fn recent(&self, limit: usize) -> Result<Vec<QueuedArticle>> {
        let rows = sqlx::query(
            r#"
            SELECT title, body, published, email, company, conditions, queued_at
            FROM queued_articles
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(decode_queued).collect()
    }
}
