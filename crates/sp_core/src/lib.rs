pub mod error;
pub mod services;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use services::{ArticleSearch, TextExtractor, TickerSearch};
pub use storage::{ArticleQueue, WatchRegistry, WatchlistStream};
pub use types::{
    CandidateArticle, Condition, PendingArticle, QueuedArticle, SearchWindow, TickerQuote,
    UserWatchlist, WatchedCompany, DEFAULT_LOOKBACK_HOURS,
};
