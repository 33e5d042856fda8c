use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, info, warn};

mod api;
mod clock;
mod config;
mod detail;
mod error;
mod grouping;
mod models;
mod normalize;
mod poller;
mod sources;

use api::AppState;
use clock::{Clock, SystemClock};
use config::{Config, FeedKind};
use detail::MatchDetails;
use poller::{FeedPoller, PollerConfig};
use sources::{
    EventsDayFeed, FootballData, LatestSoccerFeed, MatchSource, TheSportsDb, TodayMatchesFeed,
};

fn build_source(
    kind: FeedKind,
    config: &Config,
    sportsdb: &TheSportsDb,
    football_data: &FootballData,
    clock: &Arc<dyn Clock>,
) -> Arc<dyn MatchSource> {
    match kind {
        FeedKind::SportsdbLatest => Arc::new(LatestSoccerFeed::new(sportsdb.clone())),
        FeedKind::SportsdbEvents => Arc::new(EventsDayFeed::new(
            sportsdb.clone(),
            &config.sportsdb_sport,
            clock.clone(),
        )),
        FeedKind::FootballData => {
            Arc::new(TodayMatchesFeed::new(football_data.clone(), clock.clone()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    if config.uses_football_data() && config.football_data_api_key.is_none() {
        warn!("FOOTBALL_API_KEY not set – football-data.org requests use the demo token");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Build API clients (shared by feeds and detail lookups)
    let sportsdb = TheSportsDb::new(
        Some(config.sportsdb_api_key.as_str()),
        Some(config.sportsdb_api_url.as_str()),
        config.http_timeout(),
    )?;
    let football_data = FootballData::new(
        config.football_data_api_key.as_deref(),
        Some(config.football_data_api_url.as_str()),
        config.http_timeout(),
    )?;

    let live = FeedPoller::new(
        "live",
        build_source(config.live_source, &config, &sportsdb, &football_data, &clock),
        PollerConfig::live()
            .with_interval(config.live_interval())
            .with_limit(config.live_limit),
        clock.clone(),
    );
    let today = FeedPoller::new(
        "today",
        build_source(config.today_source, &config, &sportsdb, &football_data, &clock),
        PollerConfig::today()
            .with_interval(config.today_interval())
            .with_limit(config.today_limit),
        clock.clone(),
    );

    for poller in [&live, &today] {
        let mut rx = poller.subscribe();
        let name = poller.name().to_string();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                match &snapshot.error {
                    Some(e) => debug!(
                        "Feed '{}' kept {} stale matches: {}",
                        name,
                        snapshot.matches.len(),
                        e
                    ),
                    None => debug!(
                        "Feed '{}' refreshed: {} matches ({} rejected)",
                        name,
                        snapshot.matches.len(),
                        snapshot.rejected
                    ),
                }
            }
        });

        poller.start();
        info!(
            "Feed '{}' polling every {:?}",
            poller.name(),
            poller.config().interval
        );
    }

    let details = MatchDetails::new(clock.clone())
        .with_lookup(Arc::new(sportsdb))
        .with_lookup(Arc::new(football_data));

    // Start the feed API server
    let app = api::router(AppState {
        live: live.clone(),
        today: today.clone(),
        details: Arc::new(details),
    });
    let addr = config.listen_addr()?;
    info!("Feed API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run server (blocks until Ctrl-C)
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutting down");
            live.stop();
            today.stop();
        })
        .await?;

    Ok(())
}
