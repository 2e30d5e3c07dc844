use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use sp_core::{
    ArticleQueue, PendingArticle, QueuedArticle, Result, UserWatchlist, WatchRegistry,
    WatchlistStream,
};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryStore {
    watchlists: Vec<UserWatchlist>,
    queue: Vec<QueuedArticle>,
}

/// Registry and queue held in process memory. Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_watchlists(watchlists: Vec<UserWatchlist>) -> Self {
        Self {
            store: Arc::new(RwLock::new(MemoryStore {
                watchlists,
                queue: Vec::new(),
            })),
        }
    }

    /// Seed the registry from a JSON array of registry documents.
    pub async fn from_json_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let watchlists: Vec<UserWatchlist> = serde_json::from_str(&raw)?;
        tracing::info!(users = watchlists.len(), path = %path.display(), "Loaded watchlists");
        Ok(Self::with_watchlists(watchlists))
    }

    /// Every queued record in write order.
    pub async fn queued(&self) -> Vec<QueuedArticle> {
        self.store.read().await.queue.clone()
    }
}

#[async_trait]
impl WatchRegistry for MemoryStorage {
    fn watchlists(&self) -> WatchlistStream<'_> {
        stream::once(async move { self.store.read().await.watchlists.clone() })
            .flat_map(|watchlists| stream::iter(watchlists.into_iter().map(Ok)))
            .boxed()
    }

    async fn save_watchlist(&self, watchlist: &UserWatchlist) -> Result<()> {
        let mut store = self.store.write().await;
        if let Some(existing) = store
            .watchlists
            .iter_mut()
            .find(|w| w.email == watchlist.email)
        {
            *existing = watchlist.clone();
        } else {
            store.watchlists.push(watchlist.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl ArticleQueue for MemoryStorage {
    async fn enqueue(&self, article: PendingArticle) -> Result<QueuedArticle> {
        let queued = QueuedArticle {
            article,
            queued_at: Utc::now(),
        };
        self.store.write().await.queue.push(queued.clone());
        Ok(queued)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<QueuedArticle>> {
        let store = self.store.read().await;
        Ok(store.queue.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use serde_json::json;

    fn pending(title: &str) -> PendingArticle {
        PendingArticle {
            title: Some(title.to_string()),
            body: String::new(),
            published: None,
            email: "ana@example.com".to_string(),
            company: "Acme".to_string(),
            conditions: vec![json!("price>100")],
        }
    }

    #[tokio::test]
    async fn test_memory_registry_enumerates_and_upserts() {
        let storage = MemoryStorage::with_watchlists(vec![
            UserWatchlist::new("ana@example.com").watch("Acme", vec![]),
        ]);

        storage
            .save_watchlist(&UserWatchlist::new("ana@example.com").watch("Globex", vec![]))
            .await
            .unwrap();
        storage
            .save_watchlist(&UserWatchlist::new("bo@example.com"))
            .await
            .unwrap();

        let all: Vec<UserWatchlist> = storage.watchlists().try_collect().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].companies.contains_key("Globex"));
        assert!(!all[0].companies.contains_key("Acme"));
    }

    #[tokio::test]
    async fn test_memory_queue_stamps_and_orders() {
        let storage = MemoryStorage::new();
        let before = Utc::now();
        let first = storage.enqueue(pending("first")).await.unwrap();
        storage.enqueue(pending("second")).await.unwrap();

        assert!(first.queued_at >= before);
        let recent = storage.recent(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].article.title.as_deref(), Some("second"));
        assert_eq!(storage.queued().await.len(), 2);
    }

    #[tokio::test]
    async fn test_memory_storage_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(
            &path,
            r#"[{"Email": "ana@example.com", "Company": {"Acme": ["price>100"]}}]"#,
        )
        .unwrap();

        let storage = MemoryStorage::from_json_file(&path).await.unwrap();
        let all: Vec<UserWatchlist> = storage.watchlists().try_collect().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].companies["Acme"], vec![json!("price>100")]);
    }
}
