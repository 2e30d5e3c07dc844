use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Trailing search window used when none is configured.
pub const DEFAULT_LOOKBACK_HOURS: i64 = 24;

/// An alert condition. Only the downstream alert matcher interprets it,
/// ingestion copies it through untouched.
pub type Condition = Value;

/// One user's document in the watch registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserWatchlist {
    #[serde(rename = "Email", default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(rename = "Company", default, deserialize_with = "null_as_default")]
    pub companies: BTreeMap<String, Vec<Condition>>,
}

/// Registry documents are user-edited; an explicit `null` reads like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl UserWatchlist {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            companies: BTreeMap::new(),
        }
    }

    pub fn watch(mut self, company: impl Into<String>, conditions: Vec<Condition>) -> Self {
        self.companies.insert(company.into(), conditions);
        self
    }

    pub fn watched_companies(&self) -> impl Iterator<Item = WatchedCompany> + '_ {
        self.companies.iter().map(|(name, conditions)| WatchedCompany {
            name: name.clone(),
            conditions: conditions.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchedCompany {
    /// Used verbatim as the search keyword.
    pub name: String,
    pub conditions: Vec<Condition>,
}

/// A search hit before its body has been fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateArticle {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "dateTimePub", default)]
    pub published_at: Option<String>,
}

impl CandidateArticle {
    /// The article URL, if the provider sent a usable one.
    pub fn link(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| !url.is_empty())
    }
}

/// A fully assembled record that has not been written to the queue yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingArticle {
    pub title: Option<String>,
    pub body: String,
    pub published: Option<String>,
    pub email: String,
    pub company: String,
    pub conditions: Vec<Condition>,
}

impl PendingArticle {
    pub fn assemble(
        candidate: CandidateArticle,
        body: String,
        email: &str,
        company: &WatchedCompany,
    ) -> Self {
        Self {
            title: candidate.title,
            body,
            published: candidate.published_at,
            email: email.to_string(),
            company: company.name.clone(),
            conditions: company.conditions.clone(),
        }
    }
}

/// A record as stored in the output queue, stamped by the queue on write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedArticle {
    #[serde(flatten)]
    pub article: PendingArticle,
    pub queued_at: DateTime<Utc>,
}

/// Closed UTC time range handed to the article search provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SearchWindow {
    pub fn trailing(end: DateTime<Utc>, lookback: Duration) -> Self {
        Self {
            start: end - lookback,
            end,
        }
    }

    pub fn start_date(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_date(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerQuote {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub exchange: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_watchlist_reads_registry_document() {
        let doc = json!({
            "Email": "ana@example.com",
            "Company": { "Acme": ["price>100"], "Globex": [] }
        });
        let watchlist: UserWatchlist = serde_json::from_value(doc).unwrap();
        assert_eq!(watchlist.email, "ana@example.com");
        let companies: Vec<_> = watchlist.watched_companies().collect();
        assert_eq!(companies.len(), 2);
        assert_eq!(companies[0].name, "Acme");
        assert_eq!(companies[0].conditions, vec![json!("price>100")]);
    }

    #[test]
    fn test_watchlist_without_companies() {
        let watchlist: UserWatchlist =
            serde_json::from_value(json!({ "Email": "bo@example.com" })).unwrap();
        assert_eq!(watchlist.watched_companies().count(), 0);
    }

    #[test]
    fn test_watchlist_tolerates_null_fields() {
        let docs = json!([
            { "Email": null, "Company": { "Acme": [] } },
            { "Email": "bo@example.com", "Company": null }
        ]);
        let watchlists: Vec<UserWatchlist> = serde_json::from_value(docs).unwrap();
        assert_eq!(watchlists[0].email, "");
        assert_eq!(watchlists[0].watched_companies().count(), 1);
        assert_eq!(watchlists[1].email, "bo@example.com");
        assert!(watchlists[1].companies.is_empty());
    }

    #[test]
    fn test_candidate_link_ignores_missing_and_empty_urls() {
        let with_url: CandidateArticle = serde_json::from_value(json!({
            "url": "https://news.example.com/a",
            "title": "A",
            "dateTimePub": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(with_url.link(), Some("https://news.example.com/a"));
        assert_eq!(with_url.published_at.as_deref(), Some("2024-05-01T10:00:00Z"));

        let missing: CandidateArticle = serde_json::from_value(json!({ "title": "B" })).unwrap();
        assert_eq!(missing.link(), None);

        let empty: CandidateArticle = serde_json::from_value(json!({ "url": "" })).unwrap();
        assert_eq!(empty.link(), None);
    }

    #[test]
    fn test_queued_article_wire_shape() {
        let company = WatchedCompany {
            name: "Acme".to_string(),
            conditions: vec![json!("price>100")],
        };
        let candidate = CandidateArticle {
            title: Some("Acme beats estimates".to_string()),
            url: Some("https://news.example.com/acme".to_string()),
            published_at: Some("2024-05-01T10:00:00Z".to_string()),
        };
        let queued = QueuedArticle {
            article: PendingArticle::assemble(
                candidate,
                "Hello world".to_string(),
                "ana@example.com",
                &company,
            ),
            queued_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        };

        let value = serde_json::to_value(&queued).unwrap();
        assert_eq!(value["title"], "Acme beats estimates");
        assert_eq!(value["body"], "Hello world");
        assert_eq!(value["published"], "2024-05-01T10:00:00Z");
        assert_eq!(value["email"], "ana@example.com");
        assert_eq!(value["company"], "Acme");
        assert_eq!(value["conditions"], json!(["price>100"]));
        assert_eq!(value["queuedAt"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_trailing_window_spans_a_day() {
        let end = Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap();
        let window = SearchWindow::trailing(end, Duration::hours(DEFAULT_LOOKBACK_HOURS));
        assert_eq!(window.end - window.start, Duration::hours(24));
        assert_eq!(window.start_date(), "2024-05-01");
        assert_eq!(window.end_date(), "2024-05-02");
    }
}
