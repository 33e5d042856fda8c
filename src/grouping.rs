use serde::Serialize;
use std::collections::HashMap;

use crate::models::Match;

/// Matches of one competition, ordered by kickoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompetitionGroup {
    pub competition: String,
    pub matches: Vec<Match>,
}

/// Competition-grouped view of a feed.
///
/// Groups keep the order in which their competition first appears in the
/// source list; they are not sorted alphabetically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GroupedView {
    groups: Vec<CompetitionGroup>,
}

impl GroupedView {
    pub fn groups(&self) -> &[CompetitionGroup] {
        &self.groups
    }

    pub fn competitions(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.competition.as_str()).collect()
    }

    pub fn total_matches(&self) -> usize {
        self.groups.iter().map(|g| g.matches.len()).sum()
    }
}

/// Group by exact competition name, then sort each group by kickoff.
///
/// The sort is stable, so matches with equal kickoff keep their relative
/// order from `matches`. Competition names are not reconciled across
/// sources: "Premier League" and "English Premier League" stay separate.
pub fn group_by_competition(matches: &[Match]) -> GroupedView {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<CompetitionGroup> = Vec::new();

    for m in matches {
        let slot = *index.entry(m.competition.as_str()).or_insert_with(|| {
            groups.push(CompetitionGroup {
                competition: m.competition.clone(),
                matches: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].matches.push(m.clone());
    }

    for group in &mut groups {
        group.matches.sort_by_key(|m| m.kickoff_time);
    }

    GroupedView { groups }
}
