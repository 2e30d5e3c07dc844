use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use sp_core::{Error, Result, TickerQuote, TickerSearch};
use tracing::{debug, instrument};
use url::Url;

use crate::http::endpoint;

pub const YAHOO_FINANCE_URL: &str = "https://query1.finance.yahoo.com";

const QUOTE_PATH: &str = "/v7/finance/quote";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEnvelope {
    quote_response: QuoteResponse,
}

#[derive(Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    result: Option<Vec<YahooQuote>>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct YahooQuote {
    symbol: Option<String>,
    long_name: Option<String>,
    short_name: Option<String>,
    current_price: Option<f64>,
    regular_market_price: Option<f64>,
    regular_market_change: Option<f64>,
    exchange: Option<String>,
}

impl From<YahooQuote> for TickerQuote {
    fn from(quote: YahooQuote) -> Self {
        Self {
            symbol: quote.symbol.unwrap_or_default(),
            name: quote.long_name.or(quote.short_name).unwrap_or_default(),
            price: quote
                .current_price
                .or(quote.regular_market_price)
                .unwrap_or(0.0),
            change: quote.regular_market_change.unwrap_or(0.0),
            exchange: quote.exchange.unwrap_or_default(),
        }
    }
}

/// Split a free-text query into upper-cased ticker symbols.
pub fn query_symbols(query: &str) -> Vec<String> {
    query
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_uppercase())
        .collect()
}

#[derive(Debug, Clone)]
pub struct YahooFinanceClient {
    client: Client,
    endpoint: Url,
}

impl YahooFinanceClient {
    pub fn new(client: Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            endpoint: endpoint(base_url, QUOTE_PATH)?,
        })
    }

    async fn quote(&self, symbol: &str) -> Result<Option<TickerQuote>> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("symbols", symbol)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                context: format!("Yahoo Finance quote for {}", symbol),
            });
        }

        let envelope: QuoteEnvelope = response.json().await?;
        Ok(envelope
            .quote_response
            .result
            .unwrap_or_default()
            .into_iter()
            .map(TickerQuote::from)
            .find(|quote| !quote.symbol.is_empty()))
    }
}

#[async_trait]
impl TickerSearch for YahooFinanceClient {
    #[instrument(level = "debug", skip(self))]
    async fn search_tickers(&self, query: &str) -> Result<Vec<TickerQuote>> {
        let mut quotes = Vec::new();
        for symbol in query_symbols(query) {
            match self.quote(&symbol).await? {
                Some(quote) => quotes.push(quote),
                None => debug!(%symbol, "No quote data"),
            }
        }
        Ok(quotes)
    }
}
