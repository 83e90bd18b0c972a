use std::collections::VecDeque;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use shared::domain::SearchHistoryEntry;
use storage::{Storage, DEFAULT_HISTORY_CAP};
use tokio::sync::Mutex;

/// Recently submitted queries, most recent first. Re-recording a query that
/// is already present leaves its position unchanged.
#[async_trait]
pub trait SearchHistoryStore: Send + Sync {
    async fn record(&self, query: &str) -> Result<()>;
    async fn recent(&self) -> Result<Vec<SearchHistoryEntry>>;
    async fn clear(&self) -> Result<()>;
}

#[async_trait]
impl SearchHistoryStore for Storage {
    async fn record(&self, query: &str) -> Result<()> {
        self.record_search(query, DEFAULT_HISTORY_CAP).await?;
        Ok(())
    }

    async fn recent(&self) -> Result<Vec<SearchHistoryEntry>> {
        self.list_search_history(DEFAULT_HISTORY_CAP).await
    }

    async fn clear(&self) -> Result<()> {
        self.clear_search_history().await?;
        Ok(())
    }
}

/// Process-local history for sessions without a database.
pub struct MemorySearchHistory {
    cap: usize,
    entries: Mutex<VecDeque<SearchHistoryEntry>>,
}

impl Default for MemorySearchHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

impl MemorySearchHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            entries: Mutex::new(VecDeque::with_capacity(cap)),
        }
    }
}

#[async_trait]
impl SearchHistoryStore for MemorySearchHistory {
    async fn record(&self, query: &str) -> Result<()> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(());
        }
        let mut entries = self.entries.lock().await;
        if entries.iter().any(|entry| entry.query == query) {
            return Ok(());
        }
        entries.push_front(SearchHistoryEntry {
            query: query.to_string(),
            recorded_at: Utc::now(),
        });
        entries.truncate(self.cap);
        Ok(())
    }

    async fn recent(&self) -> Result<Vec<SearchHistoryEntry>> {
        Ok(self.entries.lock().await.iter().cloned().collect())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.lock().await.clear();
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/history_tests.rs"]
mod tests;
