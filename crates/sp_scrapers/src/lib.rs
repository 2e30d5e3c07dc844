pub mod extract;
pub mod http;
pub mod pipeline;
pub mod quotes;
pub mod search;

pub use extract::HtmlTextExtractor;
pub use http::build_client;
pub use pipeline::{NewsPipeline, PipelineConfig, RunSummary};
pub use quotes::YahooFinanceClient;
pub use search::EventRegistryClient;
