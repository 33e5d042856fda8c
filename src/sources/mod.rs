pub mod football_data;
pub mod thesportsdb;

pub use football_data::{FootballData, TodayMatchesFeed};
pub use thesportsdb::{EventsDayFeed, LatestSoccerFeed, TheSportsDb};

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::error::FeedError;
use crate::normalize::Schema;

/// An upstream feed a poller can refresh from.
#[async_trait]
pub trait MatchSource: Send + Sync {
    /// Fetch the feed and unwrap its raw match records.
    async fn fetch_records(&self) -> Result<Vec<Value>, FeedError>;

    /// Shape of the records `fetch_records` returns.
    fn schema(&self) -> Schema;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Single-match lookup against one API family.
#[async_trait]
pub trait DetailLookup: Send + Sync {
    /// Fetch the full raw record for an upstream id; `Ok(None)` when the
    /// upstream has no such match.
    async fn lookup(&self, raw_id: &str) -> Result<Option<Value>, FeedError>;

    /// Shape of the record `lookup` returns.
    fn detail_schema(&self) -> Schema;

    fn name(&self) -> &str;
}

/// Send a GET and decode the JSON body. Any non-2xx status is a transport
/// error.
pub(crate) async fn fetch_json(req: RequestBuilder) -> Result<Value, FeedError> {
    match fetch_json_optional(req).await? {
        Some(body) => Ok(body),
        None => Err(FeedError::Transport(format!("HTTP {}", StatusCode::NOT_FOUND))),
    }
}

/// Like `fetch_json`, but a 404 yields `Ok(None)`.
pub(crate) async fn fetch_json_optional(req: RequestBuilder) -> Result<Option<Value>, FeedError> {
    let resp = req.send().await?;
    let status = resp.status();
    debug!("{} {}", status, resp.url());

    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let body = body.chars().take(200).collect::<String>();
        return Err(FeedError::Transport(format!("HTTP {}: {}", status, body)));
    }

    let body: Value = resp.json().await?;
    Ok(Some(body))
}
