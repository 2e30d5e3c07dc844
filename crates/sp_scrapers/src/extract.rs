use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use scraper::{Html, Selector};
use sp_core::{Error, Result, TextExtractor};
use tracing::{debug, warn};

/// Pulls the paragraph text out of an article page.
#[derive(Debug, Clone)]
pub struct HtmlTextExtractor {
    client: Client,
}

impl HtmlTextExtractor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                context: url.to_string(),
            });
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !content_type.to_ascii_lowercase().contains("html") {
                return Err(Error::Extraction(format!(
                    "Unsupported content type: {}",
                    content_type
                )));
            }
        }

        let html = response.text().await?;
        Ok(paragraph_text(&html))
    }
}

#[async_trait]
impl TextExtractor for HtmlTextExtractor {
    async fn extract(&self, url: &str) -> String {
        match self.fetch_text(url).await {
            Ok(text) => {
                debug!(%url, bytes = text.len(), "Extracted article body");
                text
            }
            Err(e) => {
                warn!(%url, error = %e, "Failed to extract article body");
                String::new()
            }
        }
    }
}

/// Text of every `<p>` in document order, joined by single spaces.
pub fn paragraph_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("p") else {
        return String::new();
    };

    document
        .select(&selector)
        .map(|p| p.text().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}
