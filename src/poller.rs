//! Feed poller: keeps one feed's `FeedSnapshot` fresh.
//!
//! ```text
//!  interval tick ──▶ MatchSource::fetch_records()  (only suspension point)
//!                        │ Ok(records)                │ Err(e)
//!                        ▼                            ▼
//!             normalize → dedupe → filter     previous matches +
//!             → sort → truncate(limit)        error = Some(e)
//!                        │                            │
//!                        └──────────▶ publish ◀───────┘
//!                                       │  (skipped once stopped)
//!                                       ▼
//!                        watch channel → subscribers
//! ```
//!
//! Cycles of one poller never overlap: the scheduled loop runs them
//! sequentially, missed ticks are skipped, and an out-of-band `run_cycle`
//! that finds a cycle in flight returns without fetching.

use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::FeedError;
use crate::models::{FeedSnapshot, Match, MatchStatus};
use crate::normalize::{normalize_all, Schema};
use crate::sources::MatchSource;

pub type MatchFilter = Arc<dyn Fn(&Match) -> bool + Send + Sync>;
pub type MatchOrder = Arc<dyn Fn(&Match, &Match) -> Ordering + Send + Sync>;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_LIMIT: usize = 10;

/// Ascending kickoff.
pub fn by_kickoff(a: &Match, b: &Match) -> Ordering {
    a.kickoff_time.cmp(&b.kickoff_time)
}

/// Matches being played first, then ascending kickoff.
pub fn in_play_first(a: &Match, b: &Match) -> Ordering {
    b.status
        .is_in_play()
        .cmp(&a.status.is_in_play())
        .then_with(|| by_kickoff(a, b))
}

#[derive(Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    /// Maximum number of matches kept per snapshot, applied after sorting
    pub limit: usize,
    pub filter: MatchFilter,
    pub sort: MatchOrder,
}

impl Default for PollerConfig {
    fn default() -> Self {
        PollerConfig {
            interval: DEFAULT_INTERVAL,
            limit: DEFAULT_LIMIT,
            filter: Arc::new(|_| true),
            sort: Arc::new(by_kickoff),
        }
    }
}

impl PollerConfig {
    /// Live feed: everything that has kicked off, matches in play first.
    pub fn live() -> Self {
        PollerConfig {
            interval: DEFAULT_INTERVAL,
            limit: 8,
            filter: Arc::new(|m| m.status != MatchStatus::Scheduled),
            sort: Arc::new(in_play_first),
        }
    }

    /// Daily feed: every match of the day in kickoff order.
    pub fn today() -> Self {
        PollerConfig {
            interval: Duration::from_secs(300),
            limit: 200,
            ..Default::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Build the snapshot for one successful fetch. Pure given its inputs.
pub fn assemble_snapshot(
    schema: Schema,
    records: &[Value],
    config: &PollerConfig,
    now: chrono::DateTime<chrono::Utc>,
) -> (FeedSnapshot, Vec<crate::error::NormalizationError>) {
    let (matches, rejected) = normalize_all(schema, records, now);

    let mut seen = HashSet::new();
    let mut matches: Vec<Match> = matches
        .into_iter()
        .filter(|m| seen.insert(m.id.clone()))
        .filter(|m| (config.filter)(m))
        .collect();
    matches.sort_by(|a, b| (config.sort)(a, b));
    matches.truncate(config.limit);

    let snapshot = FeedSnapshot {
        matches,
        fetched_at: Some(now),
        error: None,
        rejected: rejected.len(),
    };
    (snapshot, rejected)
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cancels a started poller. Cloneable; every clone stops the same poller.
#[derive(Clone)]
pub struct PollerHandle {
    stopped: Arc<Mutex<bool>>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PollerHandle {
    /// Cancel all future cycles. Once this returns no further snapshot is
    /// published, including the result of a fetch still in flight.
    pub fn stop(&self) {
        *lock(&self.stopped) = true;
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
    }

    pub fn is_stopped(&self) -> bool {
        *lock(&self.stopped)
    }
}

/// Periodically refreshes one feed and publishes immutable snapshots.
pub struct FeedPoller {
    name: String,
    source: Arc<dyn MatchSource>,
    config: PollerConfig,
    clock: Arc<dyn Clock>,
    snapshot_tx: watch::Sender<Arc<FeedSnapshot>>,
    /// Shared with handles; checked and set under the lock so publication
    /// and stopping are mutually exclusive
    stopped: Arc<Mutex<bool>>,
    handle: Mutex<Option<PollerHandle>>,
    in_flight: tokio::sync::Mutex<()>,
}

impl FeedPoller {
    pub fn new(
        name: &str,
        source: Arc<dyn MatchSource>,
        config: PollerConfig,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let (snapshot_tx, _) = watch::channel(Arc::new(FeedSnapshot::empty()));
        Arc::new(FeedPoller {
            name: name.to_string(),
            source,
            config,
            clock,
            snapshot_tx,
            stopped: Arc::new(Mutex::new(false)),
            handle: Mutex::new(None),
            in_flight: tokio::sync::Mutex::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Latest published snapshot.
    pub fn current(&self) -> Arc<FeedSnapshot> {
        self.snapshot_tx.borrow().clone()
    }

    /// Receive every snapshot published from now on.
    pub fn subscribe(&self) -> watch::Receiver<Arc<FeedSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Stale once the last cycle failed or no success landed within two
    /// polling intervals.
    pub fn is_stale(&self) -> bool {
        self.current()
            .is_stale(self.clock.now(), self.config.interval * 2)
    }

    /// Run one cycle immediately, then one per `interval`.
    ///
    /// Idempotent: a second call returns the handle of the running task.
    /// A stopped poller stays stopped.
    pub fn start(self: &Arc<Self>) -> PollerHandle {
        let mut slot = lock(&self.handle);
        if let Some(handle) = slot.as_ref() {
            if handle.is_stopped() {
                debug!("[{}] Poller was stopped, not restarting", self.name);
            } else {
                debug!("[{}] Poller already started", self.name);
            }
            return handle.clone();
        }

        let poller = Arc::clone(self);
        let task = tokio::spawn(async move {
            info!(
                "[{}] Poller started (source={}, interval={:?}, limit={})",
                poller.name,
                poller.source.name(),
                poller.config.interval,
                poller.config.limit
            );
            let mut interval = tokio::time::interval(poller.config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if *lock(&poller.stopped) {
                    break;
                }
                poller.run_cycle().await;
            }
        });

        let handle = PollerHandle {
            stopped: Arc::clone(&self.stopped),
            task: Arc::new(Mutex::new(Some(task))),
        };
        *slot = Some(handle.clone());
        handle
    }

    /// Stop the poller whether or not it was started.
    pub fn stop(&self) {
        match lock(&self.handle).as_ref() {
            Some(handle) => handle.stop(),
            None => *lock(&self.stopped) = true,
        }
        info!("[{}] Poller stopped", self.name);
    }

    /// Fetch, normalize and publish once. Returns the snapshot current
    /// after the cycle.
    pub async fn run_cycle(&self) -> Arc<FeedSnapshot> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("[{}] Cycle already in flight, skipping", self.name);
            return self.current();
        };

        let next = match self.source.fetch_records().await {
            Ok(records) => {
                let (snapshot, rejected) = assemble_snapshot(
                    self.source.schema(),
                    &records,
                    &self.config,
                    self.clock.now(),
                );
                for err in &rejected {
                    debug!("[{}] Dropped record: {}", self.name, err);
                }
                debug!(
                    "[{}] Cycle ok: {} records, {} kept, {} rejected",
                    self.name,
                    records.len(),
                    snapshot.matches.len(),
                    snapshot.rejected
                );
                snapshot
            }
            Err(e) => {
                if self.current().has_data() {
                    warn!(
                        "[{}] Fetch from '{}' failed, keeping previous matches: {}",
                        self.name,
                        self.source.name(),
                        e
                    );
                } else {
                    warn!(
                        "[{}] Fetch from '{}' failed before any data: {}",
                        self.name,
                        self.source.name(),
                        e
                    );
                }
                self.failed_snapshot(e)
            }
        };

        self.publish(next);
        self.current()
    }

    /// Previous data kept as-is, with the failure recorded.
    fn failed_snapshot(&self, error: FeedError) -> FeedSnapshot {
        let prev = self.current();
        FeedSnapshot {
            matches: prev.matches.clone(),
            fetched_at: prev.fetched_at,
            error: Some(error),
            rejected: prev.rejected,
        }
    }

    fn publish(&self, snapshot: FeedSnapshot) -> bool {
        let stopped = lock(&self.stopped);
        if *stopped {
            debug!("[{}] Stopped, discarding late snapshot", self.name);
            return false;
        }
        self.snapshot_tx.send_replace(Arc::new(snapshot));
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    /// Source replaying scripted responses, then repeating `fallback`.
    pub(crate) struct ScriptedSource {
        responses: Mutex<VecDeque<Result<Vec<Value>, FeedError>>>,
        fallback: Vec<Value>,
        delay: Option<Duration>,
        pub(crate) calls: AtomicUsize,
    }

    impl ScriptedSource {
        pub(crate) fn new(responses: Vec<Result<Vec<Value>, FeedError>>) -> Self {
            ScriptedSource {
                responses: Mutex::new(responses.into()),
                fallback: vec![],
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn repeating(records: Vec<Value>) -> Self {
            ScriptedSource {
                fallback: records,
                ..ScriptedSource::new(vec![])
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(AtomicOrdering::SeqCst)
        }
    }

    #[async_trait]
    impl MatchSource for ScriptedSource {
        async fn fetch_records(&self) -> Result<Vec<Value>, FeedError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.responses.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(self.fallback.clone()))
        }

        fn schema(&self) -> Schema {
            Schema::FootballDataV4
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    pub(crate) fn fd_record(id: u64, competition: &str, kickoff: &str, status: &str) -> Value {
        json!({
            "id": id,
            "utcDate": kickoff,
            "status": status,
            "homeTeam": {"name": format!("Home {}", id)},
            "awayTeam": {"name": format!("Away {}", id)},
            "score": {"fullTime": {"home": null, "away": null}},
            "competition": {"name": competition}
        })
    }

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn poller(source: Arc<ScriptedSource>, config: PollerConfig) -> (Arc<FeedPoller>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at(start_time()));
        let poller = FeedPoller::new("test", source, config, clock.clone());
        (poller, clock)
    }

    fn five_records() -> Vec<Value> {
        vec![
            fd_record(1, "Serie A", "2024-05-01T20:45:00Z", "TIMED"),
            fd_record(2, "Serie A", "2024-05-01T12:30:00Z", "TIMED"),
            fd_record(3, "La Liga", "2024-05-01T18:00:00Z", "TIMED"),
            fd_record(4, "La Liga", "2024-05-01T11:00:00Z", "TIMED"),
            fd_record(5, "Ligue 1", "2024-05-01T15:00:00Z", "TIMED"),
        ]
    }

    #[tokio::test]
    async fn test_limit_keeps_first_ranked() {
        let source = Arc::new(ScriptedSource::repeating(five_records()));
        let (poller, _) = poller(source, PollerConfig::default().with_limit(2));

        let snap = poller.run_cycle().await;
        let ids: Vec<&str> = snap.matches.iter().map(|m| m.id.raw.as_str()).collect();
        assert_eq!(ids, vec!["4", "2"]);
        assert_eq!(snap.fetched_at, Some(start_time()));
        assert!(snap.error.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_keeps_previous_matches() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(five_records()),
            Err(FeedError::Transport("HTTP 503".into())),
        ]));
        let (poller, clock) = poller(source, PollerConfig::default());

        let first = poller.run_cycle().await;
        assert_eq!(first.matches.len(), 5);

        clock.advance(chrono::Duration::seconds(30));
        let second = poller.run_cycle().await;
        assert_eq!(second.matches, first.matches);
        assert_eq!(second.fetched_at, Some(start_time()));
        assert_eq!(second.error, Some(FeedError::Transport("HTTP 503".into())));
        assert!(poller.is_stale());
    }

    #[tokio::test]
    async fn test_error_before_any_data() {
        let source = Arc::new(ScriptedSource::new(vec![Err(FeedError::MalformedResponse(
            "no matches".into(),
        ))]));
        let (poller, _) = poller(source, PollerConfig::default());

        let snap = poller.run_cycle().await;
        assert!(snap.matches.is_empty());
        assert!(!snap.has_data());
        assert!(matches!(snap.error, Some(FeedError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_bad_records_are_dropped_and_counted() {
        let mut records = five_records();
        records.push(json!({"id": 99, "homeTeam": {"name": "No kickoff"}}));
        records.push(json!("not even an object"));
        let source = Arc::new(ScriptedSource::repeating(records));
        let (poller, _) = poller(source, PollerConfig::default());

        let snap = poller.run_cycle().await;
        assert_eq!(snap.matches.len(), 5);
        assert_eq!(snap.rejected, 2);
        assert!(snap.error.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_ids_keep_first() {
        let source = Arc::new(ScriptedSource::repeating(vec![
            fd_record(7, "Serie A", "2024-05-01T12:00:00Z", "TIMED"),
            fd_record(7, "Coppa Italia", "2024-05-01T13:00:00Z", "TIMED"),
        ]));
        let (poller, _) = poller(source, PollerConfig::default());

        let snap = poller.run_cycle().await;
        assert_eq!(snap.matches.len(), 1);
        assert_eq!(snap.matches[0].competition, "Serie A");
    }

    #[tokio::test]
    async fn test_live_preset_filters_and_orders() {
        let source = Arc::new(ScriptedSource::repeating(vec![
            fd_record(1, "Serie A", "2024-05-01T08:00:00Z", "FINISHED"),
            fd_record(2, "Serie A", "2024-05-01T09:30:00Z", "IN_PLAY"),
            fd_record(3, "Serie A", "2024-05-01T20:00:00Z", "TIMED"),
            fd_record(4, "Serie A", "2024-05-01T09:00:00Z", "PAUSED"),
        ]));
        let (poller, _) = poller(source, PollerConfig::live());

        let snap = poller.run_cycle().await;
        let statuses: Vec<(&str, MatchStatus)> = snap
            .matches
            .iter()
            .map(|m| (m.id.raw.as_str(), m.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("4", MatchStatus::HalfTime),
                ("2", MatchStatus::Live),
                ("1", MatchStatus::Finished),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_fetches_immediately_then_on_interval() {
        let source = Arc::new(ScriptedSource::repeating(five_records()));
        let (poller, _) = poller(source.clone(), PollerConfig::default());
        let mut rx = poller.subscribe();
        let started = tokio::time::Instant::now();

        let handle = poller.start();
        rx.changed().await.unwrap();
        assert_eq!(source.calls(), 1);
        assert!(started.elapsed() < Duration::from_secs(1));

        rx.changed().await.unwrap();
        assert_eq!(source.calls(), 2);
        assert!(started.elapsed() >= DEFAULT_INTERVAL);

        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let source = Arc::new(ScriptedSource::repeating(five_records()));
        let (poller, _) = poller(source.clone(), PollerConfig::default());
        let mut rx = poller.subscribe();

        let first = poller.start();
        let second = poller.start();
        rx.changed().await.unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(source.calls(), 1);

        second.stop();
        assert!(first.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_result() {
        let source = Arc::new(
            ScriptedSource::repeating(five_records()).with_delay(Duration::from_secs(10)),
        );
        let (poller, _) = poller(source.clone(), PollerConfig::default());

        let cycle = tokio::spawn({
            let poller = Arc::clone(&poller);
            async move { poller.run_cycle().await }
        });
        while source.calls() == 0 {
            tokio::task::yield_now().await;
        }
        poller.stop();

        let after = cycle.await.unwrap();
        assert_eq!(source.calls(), 1);
        assert!(!after.has_data());
        assert!(!poller.current().has_data());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_publication_after_handle_stop() {
        let source = Arc::new(ScriptedSource::repeating(five_records()));
        let (poller, _) = poller(source.clone(), PollerConfig::default());
        let mut rx = poller.subscribe();

        let handle = poller.start();
        rx.changed().await.unwrap();
        handle.stop();

        tokio::time::sleep(DEFAULT_INTERVAL * 3).await;
        assert_eq!(source.calls(), 1);
        assert!(!rx.has_changed().unwrap());

        // restarting a stopped poller does nothing
        poller.start();
        tokio::time::sleep(DEFAULT_INTERVAL).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_cycle_is_skipped() {
        let source = Arc::new(
            ScriptedSource::repeating(five_records()).with_delay(Duration::from_secs(5)),
        );
        let (poller, _) = poller(source.clone(), PollerConfig::default());

        let (a, b) = tokio::join!(poller.run_cycle(), poller.run_cycle());
        assert_eq!(source.calls(), 1);
        assert_eq!(a.matches.len() + b.matches.len(), 5);
    }
}
