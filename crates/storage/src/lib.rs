use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use shared::domain::SearchHistoryEntry;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

pub const DEFAULT_HISTORY_CAP: usize = 10;

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    /// Opens the database at `database_url`, a sqlx url or a plain file path.
    pub async fn new(database_url: &str) -> Result<Self> {
        let database_url = sqlite_url(database_url);
        let database_url = database_url.as_str();
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to `sqlite::memory:` opens a distinct database.
        let max_connections = if is_memory_url(database_url) { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open sqlite database '{database_url}'"))?;
        let storage = Self { pool };
        storage.ensure_history_table().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_history_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS search_history (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                query       TEXT NOT NULL UNIQUE,
                recorded_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure search_history table exists")?;
        Ok(())
    }

    /// Records a submitted query, keeping only the `cap` most recent distinct
    /// queries. A query already present keeps its original position.
    /// Returns whether a new entry was inserted.
    pub async fn record_search(&self, query: &str, cap: usize) -> Result<bool> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(false);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin search history transaction")?;
        let inserted = sqlx::query(
            "INSERT INTO search_history (query, recorded_at) VALUES (?1, ?2)
             ON CONFLICT(query) DO NOTHING",
        )
        .bind(query)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .context("failed to insert search history entry")?
        .rows_affected()
            > 0;

        let cap = i64::try_from(cap).unwrap_or(i64::MAX);
        let pruned = sqlx::query(
            "DELETE FROM search_history WHERE id NOT IN (
                 SELECT id FROM search_history ORDER BY id DESC LIMIT ?1
             )",
        )
        .bind(cap)
        .execute(&mut *tx)
        .await
        .context("failed to prune search history")?
        .rows_affected();
        tx.commit()
            .await
            .context("failed to commit search history transaction")?;

        debug!(query, inserted, pruned, "storage: recorded search");
        Ok(inserted)
    }

    /// Most recent first.
    pub async fn list_search_history(&self, limit: usize) -> Result<Vec<SearchHistoryEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            "SELECT query, recorded_at FROM search_history ORDER BY id DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("failed to list search history")?;

        rows.into_iter()
            .map(|row| {
                Ok(SearchHistoryEntry {
                    query: row.try_get::<String, _>("query")?,
                    recorded_at: row.try_get::<DateTime<Utc>, _>("recorded_at")?,
                })
            })
            .collect()
    }

    pub async fn clear_search_history(&self) -> Result<u64> {
        let removed = sqlx::query("DELETE FROM search_history")
            .execute(&self.pool)
            .await
            .context("failed to clear search history")?
            .rows_affected();
        Ok(removed)
    }
}

/// Turns a plain path or `sqlite:path` into a `sqlite://` url; other urls
/// pass through trimmed.
pub fn sqlite_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains("://") || is_memory_url(raw) {
        return raw.to_string();
    }
    let path = raw.strip_prefix("sqlite:").unwrap_or(raw);
    format!("sqlite://{}", path.replace('\\', "/"))
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
