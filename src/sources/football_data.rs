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

pub const DEFAULT_BASE_URL: &str = "https://api.football-data.org/v4";
/// Token accepted by football-data.org for unauthenticated, heavily
/// rate-limited access
pub const DEMO_TOKEN: &str = "demo";

/// Client for the football-data.org v4 API.
/// Docs: <https://docs.football-data.org/general/v4/match.html>
#[derive(Clone)]
pub struct FootballData {
    http: Client,
    api_key: String,
    base_url: String,
}

impl FootballData {
    pub fn new(api_key: Option<&str>, base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let base_url = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/');
        Url::parse(base_url)
            .with_context(|| format!("Invalid football-data.org URL: {}", base_url))?;
        Ok(FootballData {
            http,
            api_key: api_key.unwrap_or(DEMO_TOKEN).to_string(),
            base_url: base_url.to_string(),
        })
    }

    pub fn matches_url(&self, from: NaiveDate, to: NaiveDate) -> Result<Url, FeedError> {
        let from = from.format("%Y-%m-%d").to_string();
        let to = to.format("%Y-%m-%d").to_string();
        Url::parse_with_params(
            &format!("{}/matches", self.base_url),
            &[("dateFrom", from.as_str()), ("dateTo", to.as_str())],
        )
        .map_err(FeedError::transport)
    }

    /// `None` for ids that cannot address a match (they are numeric).
    pub fn match_url(&self, id: &str) -> Result<Option<Url>, FeedError> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Ok(None);
        }
        Url::parse(&format!("{}/matches/{}", self.base_url, id))
            .map(Some)
            .map_err(FeedError::transport)
    }

    pub async fn matches_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Value, FeedError> {
        let url = self.matches_url(from, to)?;
        debug!("Fetching football-data matches from {}", url);
        fetch_json(self.http.get(url).header("X-Auth-Token", &self.api_key)).await
    }
}

#[async_trait]
impl DetailLookup for FootballData {
    async fn lookup(&self, raw_id: &str) -> Result<Option<Value>, FeedError> {
        let Some(url) = self.match_url(raw_id)? else {
            debug!("'{}' is not a football-data match id", raw_id);
            return Ok(None);
        };
        debug!("Looking up football-data match {} at {}", raw_id, url);
        let req = self.http.get(url).header("X-Auth-Token", &self.api_key);
        match fetch_json_optional(req).await? {
            Some(body) => Schema::FootballDataV4.detail_record(&body),
            None => Ok(None),
        }
    }

    fn detail_schema(&self) -> Schema {
        Schema::FootballDataV4
    }

    fn name(&self) -> &str {
        "football-data.org"
    }
}

/// All of today's matches (UTC date) visible to the configured token.
pub struct TodayMatchesFeed {
    client: FootballData,
    clock: Arc<dyn Clock>,
}

impl TodayMatchesFeed {
    pub fn new(client: FootballData, clock: Arc<dyn Clock>) -> Self {
        TodayMatchesFeed { client, clock }
    }
}

#[async_trait]
impl MatchSource for TodayMatchesFeed {
    async fn fetch_records(&self) -> Result<Vec<Value>, FeedError> {
        let today = self.clock.now().date_naive();
        let body = self.client.matches_between(today, today).await?;
        self.schema().records(&body)
    }

    fn schema(&self) -> Schema {
        Schema::FootballDataV4
    }

    fn name(&self) -> &str {
        "football-data.org matches"
    }
}
