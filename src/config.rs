use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::time::Duration;

/// Upstream feed a poller can be pointed at.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    /// TheSportsDB latestsoccer.php (recent and in-progress fixtures)
    SportsdbLatest,
    /// TheSportsDB eventsday.php for today's date
    SportsdbEvents,
    /// football-data.org /v4/matches for today's date
    FootballData,
}

/// Football match feeds over public sports-data APIs
#[derive(Parser, Debug, Clone)]
#[command(name = "kicktrack", version, about)]
pub struct Config {
    /// Feed API listen address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Upstream for the live-matches feed
    #[arg(long, env = "LIVE_SOURCE", value_enum, default_value = "sportsdb-latest")]
    pub live_source: FeedKind,

    /// Upstream for today's-matches feed
    #[arg(long, env = "TODAY_SOURCE", value_enum, default_value = "football-data")]
    pub today_source: FeedKind,

    /// TheSportsDB v1 JSON base URL
    #[arg(
        long,
        env = "SPORTSDB_API_URL",
        default_value = "https://www.thesportsdb.com/api/v1/json"
    )]
    pub sportsdb_api_url: String,

    /// TheSportsDB API key
    #[arg(long, env = "SPORTSDB_API_KEY", default_value = "3")]
    pub sportsdb_api_key: String,

    /// Sport name passed to eventsday.php
    #[arg(long, env = "SPORTSDB_SPORT", default_value = "Soccer")]
    pub sportsdb_sport: String,

    /// football-data.org v4 base URL
    #[arg(
        long,
        env = "FOOTBALL_DATA_API_URL",
        default_value = "https://api.football-data.org/v4"
    )]
    pub football_data_api_url: String,

    /// football-data.org API token (sent as X-Auth-Token)
    #[arg(long, env = "FOOTBALL_API_KEY")]
    pub football_data_api_key: Option<String>,

    /// Live feed polling interval in seconds
    #[arg(long, env = "LIVE_INTERVAL_SECS", default_value = "30")]
    pub live_interval_secs: u64,

    /// Today feed polling interval in seconds
    #[arg(long, env = "TODAY_INTERVAL_SECS", default_value = "300")]
    pub today_interval_secs: u64,

    /// Maximum matches kept in the live feed
    #[arg(long, env = "LIVE_LIMIT", default_value = "8")]
    pub live_limit: usize,

    /// Maximum matches kept in today's feed
    #[arg(long, env = "TODAY_LIMIT", default_value = "200")]
    pub today_limit: usize,

    /// Per-request upstream timeout in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value = "10")]
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.live_interval_secs == 0 || self.today_interval_secs == 0 {
            anyhow::bail!("polling intervals must be at least 1 second");
        }
        if self.live_limit == 0 || self.today_limit == 0 {
            anyhow::bail!("feed limits must be positive");
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("http_timeout_secs must be positive");
        }
        if self.sportsdb_sport.trim().is_empty() {
            anyhow::bail!("sportsdb_sport must not be empty");
        }
        self.listen_addr()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listen_addr
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid listen address '{}': {}", self.listen_addr, e))
    }

    pub fn live_interval(&self) -> Duration {
        Duration::from_secs(self.live_interval_secs)
    }

    pub fn today_interval(&self) -> Duration {
        Duration::from_secs(self.today_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Whether any configured feed talks to football-data.org.
    pub fn uses_football_data(&self) -> bool {
        self.live_source == FeedKind::FootballData || self.today_source == FeedKind::FootballData
    }
}
