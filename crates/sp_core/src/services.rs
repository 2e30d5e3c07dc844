use async_trait::async_trait;

use crate::types::{CandidateArticle, SearchWindow, TickerQuote};
use crate::Result;

#[async_trait]
pub trait ArticleSearch: Send + Sync {
    /// One provider request for articles mentioning `keyword` inside `window`
    async fn search(&self, keyword: &str, window: &SearchWindow) -> Result<Vec<CandidateArticle>>;
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Best-effort plain text of the page at `url`. Empty when anything goes wrong.
    async fn extract(&self, url: &str) -> String;
}

#[async_trait]
pub trait TickerSearch: Send + Sync {
    /// Resolve a free-text query into quotes. Symbols without data are left out.
    async fn search_tickers(&self, query: &str) -> Result<Vec<TickerQuote>>;
}
