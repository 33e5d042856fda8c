//! Adapters for TheSportsDB v1 payloads.
//!
//! All fields arrive as strings (scores included) and may be `null` or `""`.
//! Docs: <https://www.thesportsdb.com/api.php>

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{
    classify_status_text, int_field, parse_kickoff, resolve_status, score_pair, text_field,
    StatusMarker, UNKNOWN_COMPETITION,
};
use crate::error::NormalizationError;
use crate::models::{Lineup, Match, MatchDetail, MatchId, Source, Team};

/// `latestsoccer.php` record: `Id`, `HomeTeam`, `HomeGoals`, `Time`, `Date`...
///
/// `Time` doubles as the status field: `45'` while playing, `HT`,
/// `Finished`, `Not started`.
pub fn normalize_latest(raw: &Value, now: DateTime<Utc>) -> Result<Match, NormalizationError> {
    let id = text_field(raw, "Id")
        .ok_or_else(|| NormalizationError::new("missing Id", None))?;
    let home = text_field(raw, "HomeTeam")
        .ok_or_else(|| NormalizationError::new("missing HomeTeam", Some(&id)))?;
    let away = text_field(raw, "AwayTeam")
        .ok_or_else(|| NormalizationError::new("missing AwayTeam", Some(&id)))?;
    let kickoff = text_field(raw, "Date")
        .as_deref()
        .and_then(parse_kickoff)
        .ok_or_else(|| NormalizationError::new("missing or unparseable Date", Some(&id)))?;

    let marker = text_field(raw, "Time")
        .as_deref()
        .and_then(classify_status_text)
        .unwrap_or(StatusMarker::Pending);
    let (status, live_progress) = resolve_status(marker, kickoff, now);
    let (home_score, away_score) =
        score_pair(int_field(raw, "HomeGoals"), int_field(raw, "AwayGoals"), status);

    Ok(Match {
        id: MatchId::new(Source::SportsDb, id),
        competition: text_field(raw, "League").unwrap_or_else(|| UNKNOWN_COMPETITION.to_string()),
        home_team: Team::new(home, None),
        away_team: Team::new(away, None),
        home_score,
        away_score,
        kickoff_time: kickoff,
        status,
        venue: text_field(raw, "Location"),
        live_progress,
    })
}

/// Event record as returned by `eventsday.php` and `lookupevent.php`.
pub fn normalize_event(raw: &Value, now: DateTime<Utc>) -> Result<Match, NormalizationError> {
    let id = text_field(raw, "idEvent")
        .ok_or_else(|| NormalizationError::new("missing idEvent", None))?;
    let home = text_field(raw, "strHomeTeam")
        .ok_or_else(|| NormalizationError::new("missing strHomeTeam", Some(&id)))?;
    let away = text_field(raw, "strAwayTeam")
        .ok_or_else(|| NormalizationError::new("missing strAwayTeam", Some(&id)))?;
    let kickoff = event_kickoff(raw)
        .ok_or_else(|| NormalizationError::new("missing or unparseable kickoff time", Some(&id)))?;

    let (status, live_progress) = resolve_status(event_marker(raw), kickoff, now);
    let (home_score, away_score) = score_pair(
        int_field(raw, "intHomeScore"),
        int_field(raw, "intAwayScore"),
        status,
    );

    Ok(Match {
        id: MatchId::new(Source::SportsDb, id),
        competition: text_field(raw, "strLeague")
            .unwrap_or_else(|| UNKNOWN_COMPETITION.to_string()),
        home_team: Team::new(home, None),
        away_team: Team::new(away, None),
        home_score,
        away_score,
        kickoff_time: kickoff,
        status,
        venue: text_field(raw, "strVenue"),
        live_progress,
    })
}

pub fn normalize_event_detail(
    raw: &Value,
    now: DateTime<Utc>,
) -> Result<MatchDetail, NormalizationError> {
    let summary = normalize_event(raw, now)?;
    Ok(MatchDetail {
        summary,
        event_name: text_field(raw, "strEvent"),
        description: text_field(raw, "strDescriptionEN"),
        home_lineup: side_lineup(raw, "Home"),
        away_lineup: side_lineup(raw, "Away"),
    })
}

/// `strTimestamp` when present, else `dateEvent` + `strTime`.
fn event_kickoff(raw: &Value) -> Option<DateTime<Utc>> {
    if let Some(ts) = text_field(raw, "strTimestamp").as_deref().and_then(parse_kickoff) {
        return Some(ts);
    }
    let date = text_field(raw, "dateEvent")?;
    let time = text_field(raw, "strTime")?;
    parse_kickoff(&format!("{}T{}", date, time))
}

/// A non-empty `strProgress` means the match is being played, whatever
/// `strStatus` says: a stale `Match Finished`, `HT` or `Postponed` next to a
/// progress value still reads as live. Only without progress does
/// `strStatus` decide.
fn event_marker(raw: &Value) -> StatusMarker {
    if let Some(progress) = text_field(raw, "strProgress") {
        return StatusMarker::InPlay(Some(progress));
    }
    text_field(raw, "strStatus")
        .as_deref()
        .and_then(classify_status_text)
        .unwrap_or(StatusMarker::Pending)
}

/// `strHomeLineupDefense` etc. hold `;`-separated player names.
fn side_lineup(raw: &Value, side: &str) -> Lineup {
    let list = |line: &str| {
        text_field(raw, &format!("str{}Lineup{}", side, line))
            .map(|s| parse_lineup(&s))
            .unwrap_or_default()
    };
    Lineup {
        formation: text_field(raw, &format!("str{}Formation", side)),
        goalkeeper: list("Goalkeeper"),
        defense: list("Defense"),
        midfield: list("Midfield"),
        forward: list("Forward"),
        substitutes: list("Substitutes"),
    }
}

pub(crate) fn parse_lineup(s: &str) -> Vec<String> {
    s.split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
