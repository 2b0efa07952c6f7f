//! Registry of loaded race clocks.
//!
//! [`ClockRegistry`] owns one [`RaceClock`] per loaded race. Each clock runs
//! under a child of the registry's master cancellation token, so teardown
//! of a single race and whole-server shutdown use the same path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use lapwatch_core::error::{CoreError, CoreResult};
use lapwatch_core::race_timer::{TimerError, TimerPhase, TimerSnapshot};
use lapwatch_core::types::{DbId, Timestamp};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::clock::{ClockDeps, ClockTasks, RaceClock};

/// How long teardown waits for each background task to exit.
const TASK_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ClockRegistry {
    clocks: RwLock<HashMap<DbId, ManagedClock>>,
    deps: ClockDeps,
    /// Master token, cancelled on shutdown.
    cancel: CancellationToken,
}

/// Bookkeeping for a single loaded clock.
struct ManagedClock {
    clock: Arc<RaceClock>,
    tasks: ClockTasks,
    /// Child of the master token.
    cancel: CancellationToken,
}

impl ManagedClock {
    /// Cancel and wait for both tasks so nothing ticks or writes afterwards.
    async fn stop(self) {
        self.cancel.cancel();
        let _ = tokio::time::timeout(TASK_DRAIN_TIMEOUT, self.tasks.ticker).await;
        let _ = tokio::time::timeout(TASK_DRAIN_TIMEOUT, self.tasks.writer).await;
    }
}

impl ClockRegistry {
    pub fn new(deps: ClockDeps) -> Self {
        Self {
            clocks: RwLock::new(HashMap::new()),
            deps,
            cancel: CancellationToken::new(),
        }
    }

    /// Current time according to the injected clock.
    pub fn now(&self) -> Timestamp {
        self.deps.clock.now()
    }

    /// Load the timer for a race. Loading an already-loaded race returns
    /// the live timer unchanged.
    pub async fn load(&self, owner_id: &str, race_id: DbId) -> CoreResult<TimerSnapshot> {
        let clock = self.get_or_load(owner_id, race_id).await?;
        Ok(clock.snapshot().await)
    }

    /// Snapshot of an already-loaded timer.
    pub async fn snapshot(&self, owner_id: &str, race_id: DbId) -> CoreResult<TimerSnapshot> {
        let clock = self
            .loaded(owner_id, race_id)
            .await
            .ok_or(CoreError::NotFound {
                entity: "Race timer",
                id: race_id,
            })?;
        Ok(clock.snapshot().await)
    }

    pub async fn start(&self, owner_id: &str, race_id: DbId) -> CoreResult<TimerSnapshot> {
        let clock = self.get_or_load(owner_id, race_id).await?;
        let result = clock.start().await;
        self.evict_if_completed(owner_id, &clock).await;
        result
    }

    pub async fn stop(
        &self,
        owner_id: &str,
        race_id: DbId,
        confirmed: bool,
    ) -> CoreResult<TimerSnapshot> {
        if !confirmed {
            // Reject before loading anything.
            return Err(TimerError::ConfirmationRequired.into());
        }
        let clock = self.get_or_load(owner_id, race_id).await?;
        let result = clock.stop(confirmed).await;
        self.evict_if_completed(owner_id, &clock).await;
        result
    }

    pub async fn complete_lap(&self, owner_id: &str, race_id: DbId) -> CoreResult<TimerSnapshot> {
        let clock = self.get_or_load(owner_id, race_id).await?;
        let result = clock.complete_lap().await;
        self.evict_if_completed(owner_id, &clock).await;
        result
    }

    /// Stop and forget a loaded clock. Returns `false` if none was loaded.
    pub async fn teardown(&self, owner_id: &str, race_id: DbId) -> bool {
        let managed = {
            let mut clocks = self.clocks.write().await;
            match clocks.get(&race_id) {
                Some(managed) if managed.clock.owner_id() == owner_id => clocks.remove(&race_id),
                _ => None,
            }
        };

        match managed {
            Some(managed) => {
                managed.stop().await;
                tracing::info!(race_id, owner_id, "Race clock torn down");
                true
            }
            None => false,
        }
    }

    pub async fn loaded_count(&self) -> usize {
        self.clocks.read().await.len()
    }

    /// Stop every clock. Used during graceful shutdown.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down race clocks");
        self.cancel.cancel();

        let drained: Vec<_> = self.clocks.write().await.drain().collect();
        for (race_id, managed) in drained {
            tracing::debug!(race_id, "Stopping race clock");
            managed.stop().await;
        }

        tracing::info!("Race clocks shut down");
    }

    /// A completed race never ticks or writes again, so its clock is dropped
    /// once the operation that observed it returns.
    async fn evict_if_completed(&self, owner_id: &str, clock: &RaceClock) {
        if clock.snapshot().await.phase == TimerPhase::Completed {
            self.teardown(owner_id, clock.race_id()).await;
        }
    }

    async fn loaded(&self, owner_id: &str, race_id: DbId) -> Option<Arc<RaceClock>> {
        self.clocks
            .read()
            .await
            .get(&race_id)
            .filter(|managed| managed.clock.owner_id() == owner_id)
            .map(|managed| Arc::clone(&managed.clock))
    }

    async fn get_or_load(&self, owner_id: &str, race_id: DbId) -> CoreResult<Arc<RaceClock>> {
        if let Some(clock) = self.loaded(owner_id, race_id).await {
            return Ok(clock);
        }

        let race = self
            .deps
            .store
            .find(owner_id, race_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Race",
                id: race_id,
            })?;

        let mut clocks = self.clocks.write().await;
        if self.cancel.is_cancelled() {
            return Err(CoreError::Conflict("server is shutting down".into()));
        }
        if let Some(managed) = clocks.get(&race_id) {
            return Ok(Arc::clone(&managed.clock));
        }

        let cancel = self.cancel.child_token();
        let (clock, tasks) = RaceClock::spawn(&race, &self.deps, cancel.clone());
        tracing::info!(
            race_id,
            owner_id,
            status = race.status.as_str(),
            lap = race.current_lap,
            "Race clock loaded"
        );
        clocks.insert(
            race_id,
            ManagedClock {
                clock: Arc::clone(&clock),
                tasks,
                cancel,
            },
        );
        Ok(clock)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};
    use lapwatch_core::clock::ManualClock;
    use lapwatch_core::race::{Race, RaceKind, RaceStatus};
    use lapwatch_db::MemoryRaceStore;
    use lapwatch_events::bus::{EventBus, RACE_WRITE_FAILED};

    use super::*;

    const OWNER: &str = "runner-1";

    struct Harness {
        registry: ClockRegistry,
        store: Arc<MemoryRaceStore>,
        clock: Arc<ManualClock>,
        event_bus: Arc<EventBus>,
    }

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 4, 26, 7, 0, 0).unwrap()
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryRaceStore::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let event_bus = Arc::new(EventBus::default());
        let registry = ClockRegistry::new(ClockDeps {
            store: store.clone(),
            clock: clock.clone(),
            event_bus: Arc::clone(&event_bus),
        });
        Harness {
            registry,
            store,
            clock,
            event_bus,
        }
    }

    fn race(id: DbId, kind: RaceKind, base: u32, reduction: u32) -> Race {
        Race {
            id,
            owner_id: OWNER.into(),
            name: format!("race {id}"),
            kind,
            lap_distance_meters: 1000,
            base_interval_seconds: base,
            lap_reduction_seconds: reduction,
            scheduled_start_at: None,
            status: RaceStatus::Draft,
            current_lap: 0,
            created_at: t0(),
        }
    }

    /// Let spawned tasks run until they block again.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    /// Move both the wall clock and tokio time forward one second at a time.
    async fn step(h: &Harness, seconds: u64) {
        for _ in 0..seconds {
            h.clock.advance(chrono::Duration::seconds(1));
            tokio::time::advance(TICK).await;
            settle().await;
        }
    }

    const TICK: Duration = Duration::from_secs(1);

    #[tokio::test(start_paused = true)]
    async fn manual_start_persists_active_and_start_time() {
        let h = harness();
        h.store.seed(race(1, RaceKind::FixedInterval, 60, 0)).await;

        let snapshot = h.registry.load(OWNER, 1).await.unwrap();
        assert_eq!(snapshot.phase, TimerPhase::Idle);

        let snapshot = h.registry.start(OWNER, 1).await.unwrap();
        assert_eq!(snapshot.phase, TimerPhase::Running);
        assert_eq!(snapshot.countdown_seconds, 60);

        let stored = h.store.peek(1).await.unwrap();
        assert_eq!(stored.status, RaceStatus::Active);
        assert_eq!(stored.scheduled_start_at, Some(t0()));
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_start_waits_then_runs() {
        let h = harness();
        let mut scheduled = race(1, RaceKind::FixedInterval, 60, 0);
        scheduled.scheduled_start_at = Some(t0() + chrono::Duration::seconds(10));
        h.store.seed(scheduled).await;

        let snapshot = h.registry.load(OWNER, 1).await.unwrap();
        assert_eq!(snapshot.phase, TimerPhase::AwaitingSchedule);
        assert_eq!(snapshot.countdown_seconds, 10);

        step(&h, 9).await;
        let snapshot = h.registry.snapshot(OWNER, 1).await.unwrap();
        assert_eq!(snapshot.phase, TimerPhase::AwaitingSchedule);
        assert_eq!(snapshot.countdown_seconds, 1);
        assert_eq!(h.store.peek(1).await.unwrap().status, RaceStatus::Draft);

        step(&h, 1).await;
        let snapshot = h.registry.snapshot(OWNER, 1).await.unwrap();
        assert_eq!(snapshot.phase, TimerPhase::Running);
        assert_eq!(snapshot.countdown_seconds, 60);
        assert_eq!(h.store.peek(1).await.unwrap().status, RaceStatus::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_reaching_zero_records_lap() {
        let h = harness();
        h.store.seed(race(1, RaceKind::ShrinkingInterval, 5, 2)).await;
        h.registry.start(OWNER, 1).await.unwrap();

        step(&h, 4).await;
        let snapshot = h.registry.snapshot(OWNER, 1).await.unwrap();
        assert_eq!(snapshot.countdown_seconds, 1);
        assert_eq!(snapshot.completed_laps, 0);

        step(&h, 1).await;
        let snapshot = h.registry.snapshot(OWNER, 1).await.unwrap();
        assert_eq!(snapshot.completed_laps, 1);
        assert_eq!(snapshot.countdown_seconds, 3);
        assert_eq!(h.store.peek(1).await.unwrap().current_lap, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_lap_is_written_through_queue() {
        let h = harness();
        h.store.seed(race(1, RaceKind::FixedInterval, 600, 0)).await;
        h.registry.start(OWNER, 1).await.unwrap();

        let snapshot = h.registry.complete_lap(OWNER, 1).await.unwrap();
        assert_eq!(snapshot.completed_laps, 1);
        assert_eq!(snapshot.lap_number, 2);
        settle().await;
        assert_eq!(h.store.peek(1).await.unwrap().current_lap, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_requires_confirmation_and_is_final() {
        let h = harness();
        h.store.seed(race(1, RaceKind::FixedInterval, 600, 0)).await;
        h.registry.start(OWNER, 1).await.unwrap();

        assert_matches!(
            h.registry.stop(OWNER, 1, false).await,
            Err(CoreError::Validation(_))
        );

        let snapshot = h.registry.stop(OWNER, 1, true).await.unwrap();
        assert_eq!(snapshot.phase, TimerPhase::Completed);
        assert_eq!(h.store.peek(1).await.unwrap().status, RaceStatus::Completed);
        assert_eq!(h.registry.loaded_count().await, 0);

        // Second stop is a no-op, further laps are rejected.
        assert!(h.registry.stop(OWNER, 1, true).await.is_ok());
        assert_matches!(
            h.registry.complete_lap(OWNER, 1).await,
            Err(CoreError::Conflict(_))
        );
        assert_matches!(h.registry.start(OWNER, 1).await, Err(CoreError::Conflict(_)));
        assert_eq!(h.registry.loaded_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_write_leaves_timer_idle() {
        let h = harness();
        h.store.seed(race(1, RaceKind::FixedInterval, 60, 0)).await;
        h.registry.load(OWNER, 1).await.unwrap();

        h.store.fail_writes(true);
        assert_matches!(
            h.registry.start(OWNER, 1).await,
            Err(CoreError::Persistence(_))
        );
        let snapshot = h.registry.snapshot(OWNER, 1).await.unwrap();
        assert_eq!(snapshot.phase, TimerPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_lap_write_is_published_and_timer_continues() {
        let h = harness();
        let mut events = h.event_bus.subscribe();
        h.store.seed(race(1, RaceKind::FixedInterval, 3, 0)).await;
        h.registry.start(OWNER, 1).await.unwrap();

        h.store.fail_writes(true);
        step(&h, 3).await;

        let snapshot = h.registry.snapshot(OWNER, 1).await.unwrap();
        assert_eq!(snapshot.completed_laps, 1);
        assert_eq!(h.store.peek(1).await.unwrap().current_lap, 0);

        let mut failures = Vec::new();
        while let Ok(event) = events.try_recv() {
            if event.event_type == RACE_WRITE_FAILED {
                failures.push(event);
            }
        }
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].race_id, 1);
        assert_eq!(failures[0].payload["operation"], "record_lap");
        assert_eq!(failures[0].payload["current_lap"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_stops_ticks_and_writes() {
        let h = harness();
        h.store.seed(race(1, RaceKind::FixedInterval, 2, 0)).await;
        h.registry.start(OWNER, 1).await.unwrap();
        let writes_before = h.store.timer_writes();

        assert!(h.registry.teardown(OWNER, 1).await);
        step(&h, 10).await;

        assert_eq!(h.store.timer_writes(), writes_before);
        assert_eq!(h.store.peek(1).await.unwrap().current_lap, 0);
        assert_matches!(
            h.registry.snapshot(OWNER, 1).await,
            Err(CoreError::NotFound { .. })
        );
        assert!(!h.registry.teardown(OWNER, 1).await);
    }

    #[tokio::test(start_paused = true)]
    async fn active_race_resumes_at_stored_lap() {
        let h = harness();
        let mut resumed = race(1, RaceKind::ShrinkingInterval, 300, 30);
        resumed.status = RaceStatus::Active;
        resumed.current_lap = 5;
        resumed.scheduled_start_at = Some(t0());
        h.store.seed(resumed).await;

        let snapshot = h.registry.load(OWNER, 1).await.unwrap();
        assert_eq!(snapshot.phase, TimerPhase::Running);
        assert_eq!(snapshot.completed_laps, 5);
        assert_eq!(snapshot.countdown_seconds, 150);
    }

    #[tokio::test(start_paused = true)]
    async fn load_is_idempotent_and_owner_scoped() {
        let h = harness();
        h.store.seed(race(1, RaceKind::FixedInterval, 60, 0)).await;

        h.registry.start(OWNER, 1).await.unwrap();
        step(&h, 5).await;
        let snapshot = h.registry.load(OWNER, 1).await.unwrap();
        assert_eq!(snapshot.countdown_seconds, 55);
        assert_eq!(h.registry.loaded_count().await, 1);

        assert_matches!(
            h.registry.load("intruder", 1).await,
            Err(CoreError::NotFound { .. })
        );
        assert!(!h.registry.teardown("intruder", 1).await);
        assert_eq!(h.registry.loaded_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_every_clock() {
        let h = harness();
        for id in 1..=3 {
            h.store.seed(race(id, RaceKind::FixedInterval, 2, 0)).await;
            h.registry.start(OWNER, id).await.unwrap();
        }

        h.registry.shutdown().await;
        assert_eq!(h.registry.loaded_count().await, 0);

        let writes = h.store.timer_writes();
        step(&h, 5).await;
        assert_eq!(h.store.timer_writes(), writes);
        assert_matches!(h.registry.load(OWNER, 1).await, Err(CoreError::Conflict(_)));
    }
}
