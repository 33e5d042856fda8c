//! JSON API consumed by the presentation layer.
//!
//! Serves whatever snapshot each poller last published; requests never
//! trigger an upstream fetch, except match-detail lookups.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::detail::{DetailError, MatchDetails};
use crate::grouping::{group_by_competition, CompetitionGroup};
use crate::models::{FeedSnapshot, MatchId};
use crate::poller::FeedPoller;

#[derive(Clone)]
pub struct AppState {
    pub live: Arc<FeedPoller>,
    pub today: Arc<FeedPoller>,
    pub details: Arc<MatchDetails>,
}

#[derive(Serialize)]
struct FeedResponse<'a> {
    feed: &'a str,
    stale: bool,
    #[serde(flatten)]
    snapshot: &'a FeedSnapshot,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GroupedResponse<'a> {
    feed: &'a str,
    stale: bool,
    fetched_at: Option<DateTime<Utc>>,
    total: usize,
    /// Group keys in display order, for tab bars
    competitions: Vec<&'a str>,
    groups: &'a [CompetitionGroup],
}

/// Build the Axum router for the feed API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/api/live", get(live_handler))
        .route("/api/today", get(today_handler))
        .route("/api/today/grouped", get(today_grouped_handler))
        .route("/api/matches/:id", get(match_detail_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

async fn health_handler() -> &'static str {
    "ok"
}

fn feed_response(poller: &FeedPoller) -> Response {
    let snapshot = poller.current();
    Json(FeedResponse {
        feed: poller.name(),
        stale: poller.is_stale(),
        snapshot: &snapshot,
    })
    .into_response()
}

/// GET /api/live
async fn live_handler(State(state): State<Arc<AppState>>) -> Response {
    feed_response(&state.live)
}

/// GET /api/today
async fn today_handler(State(state): State<Arc<AppState>>) -> Response {
    feed_response(&state.today)
}

/// GET /api/today/grouped
async fn today_grouped_handler(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.today.current();
    let view = group_by_competition(&snapshot.matches);
    Json(GroupedResponse {
        feed: state.today.name(),
        stale: state.today.is_stale(),
        fetched_at: snapshot.fetched_at,
        total: view.total_matches(),
        competitions: view.competitions(),
        groups: view.groups(),
    })
    .into_response()
}

/// GET /api/matches/:id where `id` is namespaced, e.g. `sportsdb:441613`
async fn match_detail_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let id: MatchId = id
        .parse()
        .map_err(|e: crate::models::MatchIdError| (StatusCode::BAD_REQUEST, e.to_string()))?;

    state.details.lookup(&id).await.map(Json).map_err(|e| {
        let status = match e {
            DetailError::UnsupportedSource(_) => StatusCode::BAD_REQUEST,
            DetailError::NotFound(_) => StatusCode::NOT_FOUND,
            DetailError::Feed(_)
            | DetailError::Normalization(_)
            | DetailError::Mismatch { .. } => StatusCode::BAD_GATEWAY,
        };
        (status, e.to_string())
    })
}
