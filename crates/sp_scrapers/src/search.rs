use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sp_core::{ArticleSearch, CandidateArticle, Error, Result, SearchWindow};
use tracing::{debug, instrument};
use url::Url;

use crate::http::endpoint;

pub const EVENT_REGISTRY_URL: &str = "https://eventregistry.org";

const GET_ARTICLES_PATH: &str = "/api/v1/article/getArticles";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GetArticlesRequest<'a> {
    api_key: &'a str,
    keyword: &'a str,
    lang: &'static str,
    sort_by: &'static str,
    action: &'static str,
    date_start: String,
    date_end: String,
}

#[derive(Deserialize, Default)]
struct GetArticlesResponse {
    #[serde(default)]
    articles: Option<ArticleResults>,
}

#[derive(Deserialize, Default)]
struct ArticleResults {
    #[serde(default)]
    results: Option<Vec<CandidateArticle>>,
}

/// Event Registry `getArticles` client: English results, newest first.
pub struct EventRegistryClient {
    client: Client,
    api_key: String,
    endpoint: Url,
}

impl EventRegistryClient {
    pub fn new(client: Client, api_key: impl Into<String>, base_url: &str) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::Config("Event Registry API key is required".to_string()));
        }
        Ok(Self {
            client,
            api_key,
            endpoint: endpoint(base_url, GET_ARTICLES_PATH)?,
        })
    }
}

impl fmt::Debug for EventRegistryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistryClient")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

#[async_trait]
impl ArticleSearch for EventRegistryClient {
    #[instrument(level = "debug", skip(self, window), fields(start = %window.start_date(), end = %window.end_date()))]
    async fn search(&self, keyword: &str, window: &SearchWindow) -> Result<Vec<CandidateArticle>> {
        let request = GetArticlesRequest {
            api_key: &self.api_key,
            keyword,
            lang: "eng",
            sort_by: "date",
            action: "getArticles",
            date_start: window.start_date(),
            date_end: window.end_date(),
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                context: "Event Registry".to_string(),
            });
        }

        let body: GetArticlesResponse = response.json().await?;
        let results = body
            .articles
            .and_then(|articles| articles.results)
            .unwrap_or_default();
        debug!(count = results.len(), "Event Registry results");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn window() -> SearchWindow {
        SearchWindow::trailing(
            Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap(),
            Duration::hours(24),
        )
    }

    #[test]
    fn test_client_requires_api_key() {
        let result = EventRegistryClient::new(Client::new(), "", EVENT_REGISTRY_URL);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let client = EventRegistryClient::new(Client::new(), "secret", EVENT_REGISTRY_URL).unwrap();
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_search_sends_provider_payload() {
        let seen = Arc::new(Mutex::new(None::<Value>));
        let captured = seen.clone();
        let router = Router::new().route(
            GET_ARTICLES_PATH,
            post(move |Json(payload): Json<Value>| {
                let captured = captured.clone();
                async move {
                    *captured.lock().unwrap() = Some(payload);
                    Json(json!({
                        "articles": { "results": [
                            { "url": "https://news.example.com/a", "title": "A", "dateTimePub": "2024-05-02T08:00:00Z" },
                            { "title": "No link" }
                        ]}
                    }))
                }
            }),
        );
        let base = serve(router).await;

        let client = EventRegistryClient::new(Client::new(), "key-123", &base).unwrap();
        let results = client.search("Acme", &window()).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].link(), Some("https://news.example.com/a"));
        assert_eq!(results[1].link(), None);

        let payload = seen.lock().unwrap().clone().unwrap();
        assert_eq!(
            payload,
            json!({
                "apiKey": "key-123",
                "keyword": "Acme",
                "lang": "eng",
                "sortBy": "date",
                "action": "getArticles",
                "dateStart": "2024-05-01",
                "dateEnd": "2024-05-02"
            })
        );
    }

    #[tokio::test]
    async fn test_search_without_results_is_empty() {
        let router = Router::new().route(GET_ARTICLES_PATH, post(|| async { Json(json!({})) }));
        let base = serve(router).await;

        let client = EventRegistryClient::new(Client::new(), "key", &base).unwrap();
        assert!(client.search("Acme", &window()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_non_success_status_is_an_error() {
        let router = Router::new().route(
            GET_ARTICLES_PATH,
            post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
        );
        let base = serve(router).await;

        let client = EventRegistryClient::new(Client::new(), "key", &base).unwrap();
        let err = client.search("Acme", &window()).await.unwrap_err();
        assert!(matches!(err, Error::Status { status: 401, .. }));
    }
}
