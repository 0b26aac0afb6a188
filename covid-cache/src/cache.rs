use crate::clock::Clock;
use crate::producer::SnapshotProducer;
use chrono::{DateTime, TimeDelta, Utc};
use covid_data::snapshot::FreshDataSnapshot;
use covid_jhu::error::Result;
use log::{info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};

/// Cache timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// A snapshot older than this is stale
    pub max_age: TimeDelta,
    /// After a failed refresh, reads wait this long before trying again.
    /// Zero retries on every stale read.
    pub retry_after: TimeDelta,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            max_age: TimeDelta::hours(1),
            retry_after: TimeDelta::zero(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
}

struct CacheState {
    snapshot: Arc<FreshDataSnapshot>,
    refreshed_at: DateTime<Utc>,
    failed_at: Option<DateTime<Utc>>,
}

/// Holds the current snapshot and replaces it when it ages past
/// [`CacheConfig::max_age`].
///
/// Reads that find the snapshot stale refresh it synchronously through the
/// producer. At most one refresh runs at a time; a read arriving while
/// another refresh is in flight is served the snapshot it replaces. A failed
/// refresh is logged and the previous snapshot keeps being served.
pub struct StalenessCache<P, C> {
    producer: P,
    clock: C,
    config: CacheConfig,
    state: RwLock<CacheState>,
    refresh_lock: Mutex<()>,
}

impl<P: SnapshotProducer, C: Clock> StalenessCache<P, C> {
    /// Populate the cache. With nothing to fall back on, a failure here is
    /// returned to the caller.
    pub fn new(producer: P, clock: C, config: CacheConfig) -> Result<Self> {
        let now = clock.now();
        let snapshot = producer.produce(now)?;
        info!(
            "[COVID Debug] cache: Initial snapshot with {} counties",
            snapshot.county_map.len()
        );
        Ok(StalenessCache {
            producer,
            clock,
            config,
            state: RwLock::new(CacheState {
                snapshot: Arc::new(snapshot),
                refreshed_at: now,
                failed_at: None,
            }),
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// The current snapshot, refreshed first if it is stale.
    pub fn get(&self) -> Arc<FreshDataSnapshot> {
        if self.should_refresh(self.clock.now()) {
            match self.refresh_lock.try_lock() {
                Ok(guard) => self.refresh_if_due(guard),
                Err(TryLockError::Poisoned(poisoned)) => self.refresh_if_due(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => {
                    info!("[COVID Debug] cache: Refresh in flight, serving previous snapshot");
                }
            }
        }
        self.current()
    }

    /// The current snapshot, without checking its age.
    pub fn current(&self) -> Arc<FreshDataSnapshot> {
        Arc::clone(&self.read_state().snapshot)
    }

    pub fn freshness(&self) -> Freshness {
        if self.is_stale(self.clock.now()) {
            Freshness::Stale
        } else {
            Freshness::Fresh
        }
    }

    pub fn last_refreshed(&self) -> DateTime<Utc> {
        self.read_state().refreshed_at
    }

    /// Refresh now regardless of age, waiting for any refresh in flight.
    ///
    /// Unlike [`get`](Self::get) the error is returned; the previous snapshot
    /// stays in place either way.
    pub fn force_refresh(&self) -> Result<Arc<FreshDataSnapshot>> {
        let _guard = self
            .refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.refresh()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.read_state().refreshed_at > self.config.max_age
    }

    fn should_refresh(&self, now: DateTime<Utc>) -> bool {
        let state = self.read_state();
        let stale = now - state.refreshed_at > self.config.max_age;
        let backing_off = state
            .failed_at
            .is_some_and(|failed_at| now - failed_at < self.config.retry_after);
        stale && !backing_off
    }

    // Holding the refresh lock; another refresh may have finished while we
    // waited for it.
    fn refresh_if_due(&self, _guard: MutexGuard<'_, ()>) {
        if !self.should_refresh(self.clock.now()) {
            return;
        }
        if let Err(e) = self.refresh() {
            warn!("[COVID Debug] cache: Refresh failed, serving previous snapshot: {}", e);
        }
    }

    fn refresh(&self) -> Result<Arc<FreshDataSnapshot>> {
        let now = self.clock.now();
        match self.producer.produce(now) {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
                state.snapshot = Arc::clone(&snapshot);
                state.refreshed_at = now;
                state.failed_at = None;
                info!("[COVID Debug] cache: Snapshot replaced at {}", now.to_rfc3339());
                Ok(snapshot)
            }
            Err(e) => {
                let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
                state.failed_at = Some(now);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::producer::FnProducer;
    use chrono::TimeZone;
    use covid_data::SeriesSet;
    use covid_jhu::error::CovidError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 11, 1, 12, 0, 0).unwrap()
    }

    fn snapshot_at(now: DateTime<Utc>) -> FreshDataSnapshot {
        FreshDataSnapshot {
            created_at: now,
            county_new_cases: SeriesSet::new(),
            county_map: Vec::new(),
            state_new_cases: SeriesSet::new(),
            state_map: Vec::new(),
        }
    }

    /// Counts calls; fails while `failing` is set.
    #[derive(Default)]
    struct TestProducer {
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    impl TestProducer {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn fail(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    impl SnapshotProducer for TestProducer {
        fn produce(&self, now: DateTime<Utc>) -> Result<FreshDataSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(CovidError::SourceUnavailable("connection refused".to_string()));
            }
            Ok(snapshot_at(now))
        }
    }

    type TestCache = StalenessCache<Arc<TestProducer>, Arc<ManualClock>>;

    fn cache() -> (TestCache, Arc<TestProducer>, Arc<ManualClock>) {
        cache_with(CacheConfig::default())
    }

    fn cache_with(config: CacheConfig) -> (TestCache, Arc<TestProducer>, Arc<ManualClock>) {
        let producer = Arc::new(TestProducer::default());
        let clock = Arc::new(ManualClock::new(start()));
        let cache = StalenessCache::new(Arc::clone(&producer), Arc::clone(&clock), config).unwrap();
        (cache, producer, clock)
    }

    #[test]
    fn read_within_max_age_serves_cached_snapshot() {
        let (cache, producer, clock) = cache();
        clock.advance(TimeDelta::minutes(30));
        assert_eq!(cache.freshness(), Freshness::Fresh);
        let snapshot = cache.get();
        assert_eq!(snapshot.created_at, start());
        assert_eq!(producer.calls(), 1);
    }

    #[test]
    fn read_past_max_age_refreshes() {
        let (cache, producer, clock) = cache();
        clock.advance(TimeDelta::minutes(61));
        assert_eq!(cache.freshness(), Freshness::Stale);
        let snapshot = cache.get();
        assert_eq!(snapshot.created_at, start() + TimeDelta::minutes(61));
        assert_eq!(producer.calls(), 2);
        assert_eq!(cache.last_refreshed(), start() + TimeDelta::minutes(61));
        assert_eq!(cache.freshness(), Freshness::Fresh);

        // Timer restarted from the refresh
        clock.advance(TimeDelta::minutes(30));
        cache.get();
        assert_eq!(producer.calls(), 2);
    }

    #[test]
    fn exactly_max_age_is_still_fresh() {
        let (cache, producer, clock) = cache();
        clock.advance(TimeDelta::hours(1));
        cache.get();
        assert_eq!(producer.calls(), 1);
    }

    #[test]
    fn failed_refresh_keeps_previous_snapshot() {
        let (cache, producer, clock) = cache();
        producer.fail(true);
        clock.advance(TimeDelta::minutes(61));
        let snapshot = cache.get();
        assert_eq!(snapshot.created_at, start());
        assert_eq!(producer.calls(), 2);
        assert_eq!(cache.last_refreshed(), start());
    }

    #[test]
    fn failed_refresh_retries_on_next_read_by_default() {
        let (cache, producer, clock) = cache();
        producer.fail(true);
        clock.advance(TimeDelta::minutes(61));
        cache.get();
        cache.get();
        assert_eq!(producer.calls(), 3);

        producer.fail(false);
        let snapshot = cache.get();
        assert_eq!(producer.calls(), 4);
        assert_eq!(snapshot.created_at, start() + TimeDelta::minutes(61));
    }

    #[test]
    fn failed_refresh_backs_off_before_retrying() {
        let (cache, producer, clock) = cache_with(CacheConfig {
            retry_after: TimeDelta::minutes(5),
            ..CacheConfig::default()
        });
        producer.fail(true);
        clock.advance(TimeDelta::minutes(61));
        cache.get();
        cache.get();
        assert_eq!(producer.calls(), 2);

        producer.fail(false);
        clock.advance(TimeDelta::minutes(5));
        let snapshot = cache.get();
        assert_eq!(producer.calls(), 3);
        assert_eq!(snapshot.created_at, start() + TimeDelta::minutes(66));
    }

    #[test]
    fn first_population_failure_is_returned() {
        let producer = TestProducer::default();
        producer.fail(true);
        let result = StalenessCache::new(producer, ManualClock::new(start()), CacheConfig::default());
        assert!(matches!(result, Err(CovidError::SourceUnavailable(_))));
    }

    #[test]
    fn force_refresh_reports_errors_and_keeps_snapshot() {
        let (cache, producer, clock) = cache();
        clock.advance(TimeDelta::minutes(10));
        let refreshed = cache.force_refresh().unwrap();
        assert_eq!(refreshed.created_at, start() + TimeDelta::minutes(10));

        producer.fail(true);
        assert!(cache.force_refresh().is_err());
        assert_eq!(cache.current().created_at, start() + TimeDelta::minutes(10));
    }

    #[test]
    fn closures_are_producers() {
        let cache = StalenessCache::new(
            FnProducer(|now: DateTime<Utc>| -> Result<FreshDataSnapshot> {
                Ok(snapshot_at(now))
            }),
            ManualClock::new(start()),
            CacheConfig::default(),
        )
        .unwrap();
        assert_eq!(cache.get().created_at, start());
    }

    /// Blocks every call after the first until released.
    struct GatedProducer {
        calls: AtomicUsize,
        started: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl SnapshotProducer for GatedProducer {
        fn produce(&self, now: DateTime<Utc>) -> Result<FreshDataSnapshot> {
            if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
                self.started.lock().unwrap().send(()).unwrap();
                self.release.lock().unwrap().recv().unwrap();
            }
            Ok(snapshot_at(now))
        }
    }

    #[test]
    fn reads_during_refresh_see_previous_snapshot() {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let producer = Arc::new(GatedProducer {
            calls: AtomicUsize::new(0),
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
        });
        let clock = Arc::new(ManualClock::new(start()));
        let cache = Arc::new(
            StalenessCache::new(Arc::clone(&producer), Arc::clone(&clock), CacheConfig::default())
                .unwrap(),
        );

        clock.advance(TimeDelta::minutes(61));
        let refreshing = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.get())
        };
        started_rx.recv().unwrap();

        // Second stale read while the first is still producing
        let during = cache.get();
        assert_eq!(during.created_at, start());
        assert_eq!(producer.calls.load(Ordering::SeqCst), 2);

        release_tx.send(()).unwrap();
        let refreshed = refreshing.join().unwrap();
        assert_eq!(refreshed.created_at, start() + TimeDelta::minutes(61));
        assert_eq!(cache.get().created_at, start() + TimeDelta::minutes(61));
        assert_eq!(producer.calls.load(Ordering::SeqCst), 2);
    }
}
