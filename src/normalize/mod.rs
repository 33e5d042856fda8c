//! Match normalizer: turns raw upstream records into canonical `Match`es.
//!
//! Each supported upstream shape has a `Schema` tag and an adapter module.
//! Adapters only read fields; the shared rules for status precedence, score
//! pairing and kickoff parsing live here so every schema applies them the
//! same way.
//!
//! Normalization is strict for identity fields (id, team names, kickoff) and
//! best-effort for everything else: an unrecognised status becomes
//! `Unknown`, a missing venue stays `None`.

pub mod football_data;
pub mod sportsdb;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::{FeedError, NormalizationError};
use crate::models::{Match, MatchDetail, MatchStatus, Source};

/// Competition name used when the upstream record carries none.
pub const UNKNOWN_COMPETITION: &str = "Unknown";

/// How far in the past a not-started kickoff may be and still count as
/// scheduled, to absorb upstream status lag around kickoff.
const KICKOFF_GRACE_MINUTES: i64 = 5;

/// Upstream payload shapes the normalizer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Schema {
    /// TheSportsDB `latestsoccer.php` (`{"teams":{"Match":[..]}}`)
    SportsDbLatest,
    /// TheSportsDB event records (`eventsday.php`, `lookupevent.php`)
    SportsDbEvent,
    /// football-data.org `/v4/matches`
    FootballDataV4,
}

impl Schema {
    /// API family whose id space records of this schema belong to.
    pub fn source(&self) -> Source {
        match self {
            Schema::SportsDbLatest | Schema::SportsDbEvent => Source::SportsDb,
            Schema::FootballDataV4 => Source::FootballData,
        }
    }

    /// Unwrap the list of match records from a feed response body.
    pub fn records(&self, body: &Value) -> Result<Vec<Value>, FeedError> {
        if !body.is_object() {
            return Err(FeedError::malformed(format!(
                "{:?}: expected a JSON object at the top level",
                self
            )));
        }
        match self {
            Schema::SportsDbLatest => match &body["teams"] {
                Value::Null => Ok(vec![]),
                Value::Object(_) => match &body["teams"]["Match"] {
                    Value::Null => Ok(vec![]),
                    Value::Array(items) => Ok(items.clone()),
                    // A single fixture is delivered as a bare object
                    single @ Value::Object(_) => Ok(vec![single.clone()]),
                    _ => Err(FeedError::malformed("teams.Match is not a list")),
                },
                _ => Err(FeedError::malformed("teams is not an object")),
            },
            Schema::SportsDbEvent => match &body["events"] {
                Value::Null => Ok(vec![]),
                Value::Array(items) => Ok(items.clone()),
                _ => Err(FeedError::malformed("events is not a list")),
            },
            Schema::FootballDataV4 => match body.get("matches") {
                Some(Value::Array(items)) => Ok(items.clone()),
                Some(_) => Err(FeedError::malformed("matches is not a list")),
                None => Err(FeedError::malformed("response has no matches field")),
            },
        }
    }

    /// Unwrap the single record from a detail-lookup response body.
    /// `Ok(None)` means the upstream answered but knows no such match.
    pub fn detail_record(&self, body: &Value) -> Result<Option<Value>, FeedError> {
        match self {
            Schema::FootballDataV4 => {
                if !body.is_object() {
                    return Err(FeedError::malformed("expected a match object"));
                }
                if body.get("id").is_none() {
                    return Ok(None);
                }
                Ok(Some(body.clone()))
            }
            _ => Ok(self.records(body)?.into_iter().next()),
        }
    }
}

/// Normalize one raw record of the given schema.
///
/// Pure: the result depends only on the arguments. `now` decides whether a
/// not-started fixture is still upcoming.
pub fn normalize(
    schema: Schema,
    raw: &Value,
    now: DateTime<Utc>,
) -> Result<Match, NormalizationError> {
    match schema {
        Schema::SportsDbLatest => sportsdb::normalize_latest(raw, now),
        Schema::SportsDbEvent => sportsdb::normalize_event(raw, now),
        Schema::FootballDataV4 => football_data::normalize_match(raw, now),
    }
}

/// Normalize a detail-lookup record, including lineups where the schema
/// provides them.
pub fn normalize_detail(
    schema: Schema,
    raw: &Value,
    now: DateTime<Utc>,
) -> Result<MatchDetail, NormalizationError> {
    match schema {
        Schema::SportsDbEvent => sportsdb::normalize_event_detail(raw, now),
        Schema::FootballDataV4 => football_data::normalize_match_detail(raw, now),
        Schema::SportsDbLatest => {
            let summary = sportsdb::normalize_latest(raw, now)?;
            Ok(MatchDetail {
                event_name: Some(format!(
                    "{} vs {}",
                    summary.home_team.name, summary.away_team.name
                )),
                summary,
                description: None,
                home_lineup: Default::default(),
                away_lineup: Default::default(),
            })
        }
    }
}

/// Normalize a batch, keeping every usable record and returning the
/// failures alongside.
pub fn normalize_all(
    schema: Schema,
    records: &[Value],
    now: DateTime<Utc>,
) -> (Vec<Match>, Vec<NormalizationError>) {
    let mut matches = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();
    for raw in records {
        match normalize(schema, raw, now) {
            Ok(m) => matches.push(m),
            Err(e) => rejected.push(e),
        }
    }
    (matches, rejected)
}

// ── Shared status rules ──────────────────────────────────────────────────────

/// What an upstream record says about the state of play, before the
/// kickoff time is taken into account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StatusMarker {
    Finished,
    HalfTime,
    /// In play, with the elapsed-time marker if the source gave one
    InPlay(Option<String>),
    /// Postponed, suspended, cancelled or abandoned
    Disrupted,
    /// Not started, or nothing recognisable
    Pending,
}

/// Apply the canonical precedence. Only `Live` carries a progress marker.
pub(crate) fn resolve_status(
    marker: StatusMarker,
    kickoff: DateTime<Utc>,
    now: DateTime<Utc>,
) -> (MatchStatus, Option<String>) {
    match marker {
        StatusMarker::Finished => (MatchStatus::Finished, None),
        StatusMarker::HalfTime => (MatchStatus::HalfTime, None),
        StatusMarker::InPlay(progress) => (MatchStatus::Live, progress),
        StatusMarker::Disrupted => (MatchStatus::Unknown, None),
        StatusMarker::Pending => {
            if kickoff >= now - Duration::minutes(KICKOFF_GRACE_MINUTES) {
                (MatchStatus::Scheduled, None)
            } else {
                (MatchStatus::Unknown, None)
            }
        }
    }
}

/// Classify free-text status such as TheSportsDB's `strStatus` or
/// `latestsoccer` `Time`. Returns `None` for not-started or unrecognised
/// text so callers can consult other fields first.
pub(crate) fn classify_status_text(text: &str) -> Option<StatusMarker> {
    let trimmed = text.trim();
    let t = trimmed.to_lowercase();
    if t.is_empty() {
        return None;
    }
    if t.contains("finished")
        || t.contains("full time")
        || matches!(t.as_str(), "ft" | "aet" | "pen" | "ap" | "aw" | "awd" | "wo")
        || t.starts_with("after ")
    {
        return Some(StatusMarker::Finished);
    }
    if matches!(t.as_str(), "ht" | "halftime" | "half time" | "half-time" | "break" | "bt") {
        return Some(StatusMarker::HalfTime);
    }
    if is_minute_marker(&t) {
        return Some(StatusMarker::InPlay(Some(trimmed.to_string())));
    }
    if matches!(
        t.as_str(),
        "1h" | "2h" | "et" | "p" | "live" | "in play" | "in progress" | "first half"
            | "second half" | "extra time" | "penalties"
    ) {
        return Some(StatusMarker::InPlay(None));
    }
    if t.contains("postponed")
        || t.contains("cancel")
        || t.contains("abandon")
        || t.contains("suspend")
        || t.contains("interrupt")
        || matches!(t.as_str(), "pst" | "canc" | "abd" | "susp" | "int")
    {
        return Some(StatusMarker::Disrupted);
    }
    None
}

/// `45'`, `90+3'`, or a bare minute count such as `67`.
fn is_minute_marker(t: &str) -> bool {
    if t.contains('\'') {
        return true;
    }
    let mut parts = t.split('+');
    let first_is_minute = parts
        .next()
        .map(|m| !m.is_empty() && m.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false);
    first_is_minute && parts.all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

// ── Field helpers ────────────────────────────────────────────────────────────

/// Non-empty trimmed string; numbers are rendered as text.
pub(crate) fn text_field(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer that may arrive as a JSON number or a numeric string.
pub(crate) fn int_field(raw: &Value, key: &str) -> Option<i64> {
    match raw.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Pair up two reported scores. Either both sides are usable or neither
/// is; a match in play with no reported score is 0-0.
pub(crate) fn score_pair(
    home: Option<i64>,
    away: Option<i64>,
    status: MatchStatus,
) -> (Option<u32>, Option<u32>) {
    let to_u32 = |v: Option<i64>| v.and_then(|v| u32::try_from(v).ok());
    match (to_u32(home), to_u32(away)) {
        (Some(h), Some(a)) => (Some(h), Some(a)),
        _ if status.is_in_play() => (Some(0), Some(0)),
        _ => (None, None),
    }
}

/// Parse an upstream timestamp into UTC. Zone-less values are taken as UTC.
pub(crate) fn parse_kickoff(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // TheSportsDB sometimes omits the colon in the offset ("+0000")
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
