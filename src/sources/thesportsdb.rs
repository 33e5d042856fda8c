use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{fetch_json, fetch_json_optional, DetailLookup, MatchSource};
use crate::clock::Clock;
use crate::error::FeedError;
use crate::normalize::Schema;

pub const DEFAULT_BASE_URL: &str = "https://www.thesportsdb.com/api/v1/json";
/// TheSportsDB's public free-tier key
pub const FREE_API_KEY: &str = "3";

/// Client for TheSportsDB v1 JSON API.
/// Docs: <https://www.thesportsdb.com/api.php>
#[derive(Clone)]
pub struct TheSportsDb {
    http: Client,
    api_key: String,
    /// Base URL for overriding in tests
    base_url: String,
}

impl TheSportsDb {
    pub fn new(api_key: Option<&str>, base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let base_url = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/');
        Url::parse(base_url).with_context(|| format!("Invalid TheSportsDB URL: {}", base_url))?;
        Ok(TheSportsDb {
            http,
            api_key: api_key.unwrap_or(FREE_API_KEY).to_string(),
            base_url: base_url.to_string(),
        })
    }

    fn endpoint(&self, script: &str, params: &[(&str, &str)]) -> Result<Url, FeedError> {
        let raw = format!("{}/{}/{}", self.base_url, self.api_key, script);
        // An empty pair list would still leave a trailing '?'
        let url = if params.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, params)
        };
        url.map_err(FeedError::transport)
    }

    pub fn latest_soccer_url(&self) -> Result<Url, FeedError> {
        self.endpoint("latestsoccer.php", &[])
    }

    pub fn events_day_url(&self, date: NaiveDate, sport: &str) -> Result<Url, FeedError> {
        let day = date.format("%Y-%m-%d").to_string();
        self.endpoint("eventsday.php", &[("d", day.as_str()), ("s", sport)])
    }

    pub fn lookup_event_url(&self, id: &str) -> Result<Url, FeedError> {
        self.endpoint("lookupevent.php", &[("id", id)])
    }

    pub async fn latest_soccer(&self) -> Result<Value, FeedError> {
        let url = self.latest_soccer_url()?;
        debug!("Fetching latest soccer from {}", url);
        fetch_json(self.http.get(url)).await
    }

    pub async fn events_day(&self, date: NaiveDate, sport: &str) -> Result<Value, FeedError> {
        let url = self.events_day_url(date, sport)?;
        debug!("Fetching {} events for {} from {}", sport, date, url);
        fetch_json(self.http.get(url)).await
    }
}

#[async_trait]
impl DetailLookup for TheSportsDb {
    async fn lookup(&self, raw_id: &str) -> Result<Option<Value>, FeedError> {
        let url = self.lookup_event_url(raw_id)?;
        debug!("Looking up event {} at {}", raw_id, url);
        match fetch_json_optional(self.http.get(url)).await? {
            Some(body) => Schema::SportsDbEvent.detail_record(&body),
            None => Ok(None),
        }
    }

    fn detail_schema(&self) -> Schema {
        Schema::SportsDbEvent
    }

    fn name(&self) -> &str {
        "TheSportsDB"
    }
}

/// `latestsoccer.php`: recent and in-progress fixtures across leagues.
pub struct LatestSoccerFeed {
    client: TheSportsDb,
}

impl LatestSoccerFeed {
    pub fn new(client: TheSportsDb) -> Self {
        LatestSoccerFeed { client }
    }
}

#[async_trait]
impl MatchSource for LatestSoccerFeed {
    async fn fetch_records(&self) -> Result<Vec<Value>, FeedError> {
        let body = self.client.latest_soccer().await?;
        self.schema().records(&body)
    }

    fn schema(&self) -> Schema {
        Schema::SportsDbLatest
    }

    fn name(&self) -> &str {
        "TheSportsDB latestsoccer"
    }
}

/// `eventsday.php` for the current UTC date.
pub struct EventsDayFeed {
    client: TheSportsDb,
    sport: String,
    clock: Arc<dyn Clock>,
}

impl EventsDayFeed {
    pub fn new(client: TheSportsDb, sport: &str, clock: Arc<dyn Clock>) -> Self {
        EventsDayFeed {
            client,
            sport: sport.to_string(),
            clock,
        }
    }
}

#[async_trait]
impl MatchSource for EventsDayFeed {
    async fn fetch_records(&self) -> Result<Vec<Value>, FeedError> {
        let today = self.clock.now().date_naive();
        let body = self.client.events_day(today, &self.sport).await?;
        self.schema().records(&body)
    }

    fn schema(&self) -> Schema {
        Schema::SportsDbEvent
    }

    fn name(&self) -> &str {
        "TheSportsDB eventsday"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> TheSportsDb {
        TheSportsDb::new(None, Some("https://example.test/api/v1/json/"), Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn test_latest_soccer_url_uses_free_key() {
        let url = client().latest_soccer_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.test/api/v1/json/3/latestsoccer.php"
        );
    }

    #[test]
    fn test_events_day_url() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let url = client().events_day_url(date, "Soccer").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.test/api/v1/json/3/eventsday.php?d=2024-05-01&s=Soccer"
        );
    }

    #[test]
    fn test_lookup_url_escapes_id() {
        let url = client().lookup_event_url("12 3").unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.test/api/v1/json/3/lookupevent.php?id=12+3"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(TheSportsDb::new(Some("key"), Some("not a url"), Duration::from_secs(5)).is_err());
    }

    #[tokio::test]
    async fn test_lookup_event() {
        use mockito::Matcher;

        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/3/lookupevent.php")
            .match_query(Matcher::UrlEncoded("id".into(), "441613".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"events": [{"idEvent": "441613", "strEvent": "Liverpool vs Swansea"}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/3/lookupevent.php")
            .match_query(Matcher::UrlEncoded("id".into(), "1".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"events": null}"#)
            .create_async()
            .await;

        let client = TheSportsDb::new(None, Some(&server.url()), Duration::from_secs(5)).unwrap();
        let record = client.lookup("441613").await.unwrap().unwrap();
        assert_eq!(record["strEvent"], "Liverpool vs Swansea");
        assert_eq!(client.lookup("1").await.unwrap(), None);
    }
}
