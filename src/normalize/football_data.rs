//! Adapter for football-data.org v4 match objects.
//!
//! Unlike TheSportsDB these are typed: numeric ids, nested team objects,
//! nullable integer scores and an upper-case `status` enum.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::{parse_kickoff, resolve_status, score_pair, StatusMarker, UNKNOWN_COMPETITION};
use crate::error::NormalizationError;
use crate::models::{Lineup, Match, MatchDetail, MatchId, Source, Team};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FdMatch {
    id: Option<u64>,
    utc_date: Option<String>,
    status: Option<String>,
    minute: Option<Value>,
    home_team: Option<FdTeam>,
    away_team: Option<FdTeam>,
    score: Option<FdScore>,
    competition: Option<FdCompetition>,
    venue: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FdTeam {
    name: Option<String>,
    short_name: Option<String>,
    formation: Option<String>,
    lineup: Option<Vec<FdPlayer>>,
    bench: Option<Vec<FdPlayer>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FdPlayer {
    name: Option<String>,
    position: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FdScore {
    full_time: Option<FdScoreLine>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FdScoreLine {
    home: Option<i64>,
    away: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FdCompetition {
    name: Option<String>,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn decode(raw: &Value) -> Result<FdMatch, NormalizationError> {
    FdMatch::deserialize(raw).map_err(|e| {
        let raw_id = raw.get("id").map(|v| v.to_string());
        NormalizationError::new(format!("unexpected match shape: {}", e), raw_id.as_deref())
    })
}

fn status_marker(status: Option<&str>, minute: Option<&Value>) -> StatusMarker {
    let progress = minute.and_then(|m| match m {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    });
    match status.map(str::to_uppercase).as_deref() {
        Some("FINISHED") | Some("AWARDED") => StatusMarker::Finished,
        Some("PAUSED") => StatusMarker::HalfTime,
        Some("IN_PLAY") | Some("LIVE") => StatusMarker::InPlay(progress),
        Some("POSTPONED") | Some("SUSPENDED") | Some("CANCELLED") => StatusMarker::Disrupted,
        _ => StatusMarker::Pending,
    }
}

fn to_match(fd: &FdMatch, now: DateTime<Utc>) -> Result<Match, NormalizationError> {
    let id = fd
        .id
        .map(|id| id.to_string())
        .ok_or_else(|| NormalizationError::new("missing id", None))?;
    let home = fd
        .home_team
        .as_ref()
        .and_then(|t| non_empty(&t.name))
        .ok_or_else(|| NormalizationError::new("missing homeTeam.name", Some(&id)))?;
    let away = fd
        .away_team
        .as_ref()
        .and_then(|t| non_empty(&t.name))
        .ok_or_else(|| NormalizationError::new("missing awayTeam.name", Some(&id)))?;
    let kickoff = non_empty(&fd.utc_date)
        .and_then(parse_kickoff)
        .ok_or_else(|| NormalizationError::new("missing or unparseable utcDate", Some(&id)))?;

    let (status, live_progress) = resolve_status(
        status_marker(fd.status.as_deref(), fd.minute.as_ref()),
        kickoff,
        now,
    );
    let full_time = fd.score.as_ref().and_then(|s| s.full_time.as_ref());
    let (home_score, away_score) = score_pair(
        full_time.and_then(|l| l.home),
        full_time.and_then(|l| l.away),
        status,
    );

    Ok(Match {
        id: MatchId::new(Source::FootballData, id),
        competition: fd
            .competition
            .as_ref()
            .and_then(|c| non_empty(&c.name))
            .unwrap_or(UNKNOWN_COMPETITION)
            .to_string(),
        home_team: Team::new(home, fd.home_team.as_ref().and_then(|t| non_empty(&t.short_name))),
        away_team: Team::new(away, fd.away_team.as_ref().and_then(|t| non_empty(&t.short_name))),
        home_score,
        away_score,
        kickoff_time: kickoff,
        status,
        venue: non_empty(&fd.venue).map(str::to_string),
        live_progress,
    })
}

pub fn normalize_match(raw: &Value, now: DateTime<Utc>) -> Result<Match, NormalizationError> {
    to_match(&decode(raw)?, now)
}

pub fn normalize_match_detail(
    raw: &Value,
    now: DateTime<Utc>,
) -> Result<MatchDetail, NormalizationError> {
    let fd = decode(raw)?;
    let summary = to_match(&fd, now)?;
    Ok(MatchDetail {
        event_name: Some(format!(
            "{} vs {}",
            summary.home_team.name, summary.away_team.name
        )),
        summary,
        description: None,
        home_lineup: fd.home_team.as_ref().map(team_lineup).unwrap_or_default(),
        away_lineup: fd.away_team.as_ref().map(team_lineup).unwrap_or_default(),
    })
}

fn team_lineup(team: &FdTeam) -> Lineup {
    let mut lineup = Lineup {
        formation: non_empty(&team.formation).map(str::to_string),
        ..Default::default()
    };
    for player in team.lineup.iter().flatten() {
        let Some(name) = non_empty(&player.name) else {
            continue;
        };
        let line = match position_line(player.position.as_deref()) {
            Line::Goalkeeper => &mut lineup.goalkeeper,
            Line::Defense => &mut lineup.defense,
            Line::Midfield => &mut lineup.midfield,
            Line::Forward => &mut lineup.forward,
        };
        line.push(name.to_string());
    }
    lineup.substitutes = team
        .bench
        .iter()
        .flatten()
        .filter_map(|p| non_empty(&p.name).map(str::to_string))
        .collect();
    lineup
}

enum Line {
    Goalkeeper,
    Defense,
    Midfield,
    Forward,
}

/// Covers both the coarse (`Defence`, `Offence`) and the detailed
/// (`Centre-Back`, `Left Winger`) position vocabularies.
fn position_line(position: Option<&str>) -> Line {
    let p = position.unwrap_or("").to_lowercase();
    if p.contains("goalkeeper") {
        Line::Goalkeeper
    } else if p.contains("defen") || p.contains("back") {
        Line::Defense
    } else if p.contains("offence")
        || p.contains("forward")
        || p.contains("winger")
        || p.contains("striker")
    {
        Line::Forward
    } else {
        Line::Midfield
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchStatus;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap()
    }

    fn fd_match(status: &str, home: Value, away: Value) -> Value {
        json!({
            "id": 436123,
            "utcDate": "2024-05-01T19:00:00Z",
            "status": status,
            "homeTeam": {"id": 86, "name": "Real Madrid CF", "shortName": "Real Madrid"},
            "awayTeam": {"id": 5, "name": "FC Bayern München", "shortName": ""},
            "score": {"fullTime": {"home": home, "away": away}},
            "competition": {"id": 2001, "name": "UEFA Champions League"}
        })
    }

    #[test]
    fn test_timed_match_is_scheduled() {
        let m = normalize_match(&fd_match("TIMED", Value::Null, Value::Null), now()).unwrap();
        assert_eq!(m.id, MatchId::new(Source::FootballData, "436123"));
        assert_eq!(m.status, MatchStatus::Scheduled);
        assert_eq!((m.home_score, m.away_score), (None, None));
        assert_eq!(m.home_team.short_name, "Real Madrid");
        assert_eq!(m.away_team.short_name, "FC Bayern München");
        assert_eq!(m.competition, "UEFA Champions League");
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            ("IN_PLAY", MatchStatus::Live),
            ("LIVE", MatchStatus::Live),
            ("PAUSED", MatchStatus::HalfTime),
            ("FINISHED", MatchStatus::Finished),
            ("AWARDED", MatchStatus::Finished),
            ("POSTPONED", MatchStatus::Unknown),
            ("CANCELLED", MatchStatus::Unknown),
            ("SCHEDULED", MatchStatus::Scheduled),
        ];
        for (code, expected) in cases {
            let m = normalize_match(&fd_match(code, json!(1), json!(1)), now()).unwrap();
            assert_eq!(m.status, expected, "status code {}", code);
        }
    }

    #[test]
    fn test_in_play_minute_becomes_progress() {
        let mut raw = fd_match("IN_PLAY", json!(0), json!(0));
        raw["minute"] = json!(63);
        let m = normalize_match(&raw, now()).unwrap();
        assert_eq!(m.live_progress.as_deref(), Some("63"));
        assert_eq!((m.home_score, m.away_score), (Some(0), Some(0)));

        raw["status"] = json!("FINISHED");
        let m = normalize_match(&raw, now()).unwrap();
        assert!(m.live_progress.is_none());
    }

    #[test]
    fn test_missing_identity_fields() {
        let mut raw = fd_match("TIMED", Value::Null, Value::Null);
        raw["utcDate"] = Value::Null;
        let err = normalize_match(&raw, now()).unwrap_err();
        assert_eq!(err.raw_id.as_deref(), Some("436123"));

        let mut raw = fd_match("TIMED", Value::Null, Value::Null);
        raw["homeTeam"] = json!({"name": null});
        assert!(normalize_match(&raw, now()).is_err());

        let mut raw = fd_match("TIMED", Value::Null, Value::Null);
        raw["id"] = json!("not-a-number");
        assert!(normalize_match(&raw, now()).is_err());
    }

    #[test]
    fn test_detail_lineups_by_position() {
        let mut raw = fd_match("FINISHED", json!(2), json!(1));
        raw["homeTeam"]["formation"] = json!("4-3-3");
        raw["homeTeam"]["lineup"] = json!([
            {"name": "Courtois", "position": "Goalkeeper"},
            {"name": "Rüdiger", "position": "Centre-Back"},
            {"name": "Kroos", "position": "Central Midfield"},
            {"name": "Vinícius Júnior", "position": "Left Winger"},
            {"name": "Mystery", "position": null}
        ]);
        raw["homeTeam"]["bench"] = json!([{"name": "Lunin", "position": "Goalkeeper"}]);

        let detail = normalize_match_detail(&raw, now()).unwrap();
        let home = &detail.home_lineup;
        assert_eq!(home.formation.as_deref(), Some("4-3-3"));
        assert_eq!(home.goalkeeper, vec!["Courtois"]);
        assert_eq!(home.defense, vec!["Rüdiger"]);
        assert_eq!(home.midfield, vec!["Kroos", "Mystery"]);
        assert_eq!(home.forward, vec!["Vinícius Júnior"]);
        assert_eq!(home.substitutes, vec!["Lunin"]);
        assert!(detail.away_lineup.is_empty());
        assert_eq!(
            detail.event_name.as_deref(),
            Some("Real Madrid CF vs FC Bayern München")
        );
    }
}
