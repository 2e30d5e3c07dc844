use std::sync::Arc;

use sp_core::TickerSearch;
use sp_scrapers::NewsPipeline;

pub struct AppState {
    pub pipeline: Arc<NewsPipeline>,
    pub tickers: Arc<dyn TickerSearch>,
}
