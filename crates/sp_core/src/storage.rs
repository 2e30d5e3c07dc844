use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::types::{PendingArticle, QueuedArticle, UserWatchlist};
use crate::Result;

/// Single-pass enumeration of the registry. An `Err` item means the
/// registry could not be read.
pub type WatchlistStream<'a> = BoxStream<'a, Result<UserWatchlist>>;

#[async_trait]
pub trait WatchRegistry: Send + Sync {
    /// Enumerate every user's watchlist
    fn watchlists(&self) -> WatchlistStream<'_>;

    /// Insert or replace the watchlist keyed by its email
    async fn save_watchlist(&self, watchlist: &UserWatchlist) -> Result<()>;
}

#[async_trait]
pub trait ArticleQueue: Send + Sync {
    /// Append a record. The queue stamps `queued_at`.
    async fn enqueue(&self, article: PendingArticle) -> Result<QueuedArticle>;

    /// Newest records first
    async fn recent(&self, limit: usize) -> Result<Vec<QueuedArticle>>;
}
