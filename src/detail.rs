use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::{FeedError, NormalizationError};
use crate::models::{MatchDetail, MatchId, Source};
use crate::normalize::normalize_detail;
use crate::sources::DetailLookup;

#[derive(Error, Debug)]
pub enum DetailError {
    #[error("no detail lookup configured for source '{}'", .0.prefix())]
    UnsupportedSource(Source),
    #[error("match {0} not found")]
    NotFound(MatchId),
    /// The upstream answered with a record for a different match
    #[error("lookup for {requested} returned {returned}")]
    Mismatch { requested: MatchId, returned: MatchId },
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error("unusable match record: {0}")]
    Normalization(#[from] NormalizationError),
}

/// Resolves a selected match to its full record by asking the API family
/// encoded in its id.
pub struct MatchDetails {
    lookups: HashMap<Source, Arc<dyn DetailLookup>>,
    clock: Arc<dyn Clock>,
}

impl MatchDetails {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MatchDetails {
            lookups: HashMap::new(),
            clock,
        }
    }

    /// Register a lookup for the id space of its detail schema.
    pub fn with_lookup(mut self, lookup: Arc<dyn DetailLookup>) -> Self {
        self.lookups.insert(lookup.detail_schema().source(), lookup);
        self
    }

    pub async fn lookup(&self, id: &MatchId) -> Result<MatchDetail, DetailError> {
        let lookup = self
            .lookups
            .get(&id.source)
            .ok_or(DetailError::UnsupportedSource(id.source))?;

        debug!("Looking up {} via {}", id, lookup.name());
        let raw = lookup
            .lookup(&id.raw)
            .await
            .inspect_err(|e| warn!("Detail lookup for {} failed: {}", id, e))?
            .ok_or_else(|| DetailError::NotFound(id.clone()))?;

        let detail = normalize_detail(lookup.detail_schema(), &raw, self.clock.now())?;
        if detail.summary.id != *id {
            warn!("Lookup for {} answered with {}", id, detail.summary.id);
            return Err(DetailError::Mismatch {
                requested: id.clone(),
                returned: detail.summary.id,
            });
        }
        if detail.home_lineup.is_empty() && detail.away_lineup.is_empty() {
            debug!("No lineups published for {}", id);
        }
        Ok(detail)
    }
}
