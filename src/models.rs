use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::FeedError;

/// Upstream API family a match came from.
///
/// Ids from different families live in unrelated id spaces, so every
/// `MatchId` carries its family and detail lookups are routed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    SportsDb,
    FootballData,
}

impl Source {
    pub fn prefix(&self) -> &'static str {
        match self {
            Source::SportsDb => "sportsdb",
            Source::FootballData => "football-data",
        }
    }
}

/// Namespaced match identifier, rendered as `<source>:<raw>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchId {
    pub source: Source,
    /// Identifier as the upstream API knows it
    pub raw: String,
}

impl MatchId {
    pub fn new(source: Source, raw: impl Into<String>) -> Self {
        MatchId {
            source,
            raw: raw.into(),
        }
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source.prefix(), self.raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchIdError {
    #[error("match id '{0}' has no source prefix")]
    MissingPrefix(String),
    #[error("unknown match source '{0}'")]
    UnknownSource(String),
    #[error("match id '{0}' has an empty upstream id")]
    EmptyId(String),
}

impl FromStr for MatchId {
    type Err = MatchIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, raw) = s
            .split_once(':')
            .ok_or_else(|| MatchIdError::MissingPrefix(s.to_string()))?;
        let source = match prefix {
            "sportsdb" => Source::SportsDb,
            "football-data" => Source::FootballData,
            other => return Err(MatchIdError::UnknownSource(other.to_string())),
        };
        if raw.trim().is_empty() {
            return Err(MatchIdError::EmptyId(s.to_string()));
        }
        Ok(MatchId::new(source, raw.trim()))
    }
}

impl Serialize for MatchId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub name: String,
    /// Falls back to `name` when the upstream has no short form
    pub short_name: String,
}

impl Team {
    pub fn new(name: impl Into<String>, short_name: Option<&str>) -> Self {
        let name = name.into();
        let short_name = short_name
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| name.clone());
        Team { name, short_name }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Scheduled,
    Live,
    #[serde(rename = "HALFTIME")]
    HalfTime,
    Finished,
    Unknown,
}

impl MatchStatus {
    /// Play has started and not yet ended.
    pub fn is_in_play(&self) -> bool {
        matches!(self, MatchStatus::Live | MatchStatus::HalfTime)
    }
}

/// Canonical match record every upstream shape is normalized into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: MatchId,
    pub competition: String,
    pub home_team: Team,
    pub away_team: Team,
    /// `None` means no score reported, as opposed to a real 0
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub kickoff_time: DateTime<Utc>,
    pub status: MatchStatus,
    pub venue: Option<String>,
    /// Elapsed-time marker, only set while `status == Live`
    pub live_progress: Option<String>,
}

/// One immutable result of a poll cycle.
///
/// A failed cycle republishes the previous matches and `fetched_at` with
/// `error` set, so consumers can tell "no data yet" from "stale data".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSnapshot {
    pub matches: Vec<Match>,
    /// `None` until the first successful cycle
    pub fetched_at: Option<DateTime<Utc>>,
    pub error: Option<FeedError>,
    /// Records dropped by normalization in the cycle that produced `matches`
    pub rejected: usize,
}

impl FeedSnapshot {
    pub fn empty() -> Self {
        FeedSnapshot {
            matches: Vec::new(),
            fetched_at: None,
            error: None,
            rejected: 0,
        }
    }

    pub fn has_data(&self) -> bool {
        self.fetched_at.is_some()
    }

    /// True when the last cycle failed, nothing was ever fetched, or the
    /// data is older than `max_age`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        if self.error.is_some() {
            return true;
        }
        match self.fetched_at {
            None => true,
            Some(at) => (now - at).to_std().map(|age| age > max_age).unwrap_or(false),
        }
    }
}

/// Players listed for one side, by line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Lineup {
    pub formation: Option<String>,
    pub goalkeeper: Vec<String>,
    pub defense: Vec<String>,
    pub midfield: Vec<String>,
    pub forward: Vec<String>,
    pub substitutes: Vec<String>,
}

impl Lineup {
    pub fn is_empty(&self) -> bool {
        self.goalkeeper.is_empty()
            && self.defense.is_empty()
            && self.midfield.is_empty()
            && self.forward.is_empty()
            && self.substitutes.is_empty()
    }
}

/// Full record behind a single selected match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetail {
    #[serde(rename = "match")]
    pub summary: Match,
    pub event_name: Option<String>,
    pub description: Option<String>,
    pub home_lineup: Lineup,
    pub away_lineup: Lineup,
}
