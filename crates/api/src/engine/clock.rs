//! A loaded race: its timer, the one-second tick loop and the write queue.
//!
//! Every persistence write goes through a single per-clock queue, so writes
//! land in the order the timer produced them. Lap advances are queued and
//! forgotten; a failure is logged and published as `race.write_failed`
//! while the local countdown keeps going. Start and stop wait for their
//! write and only commit the transition once it succeeded.

use std::sync::Arc;
use std::time::Duration;

use lapwatch_core::clock::Clock;
use lapwatch_core::error::{CoreError, CoreResult};
use lapwatch_core::race::Race;
use lapwatch_core::race_timer::{RaceTimer, TimerEffect, TimerError, TimerSnapshot};
use lapwatch_core::store::RaceStore;
use lapwatch_core::types::{DbId, Timestamp};
use lapwatch_events::bus::{
    EventBus, RaceEvent, RACE_COMPLETED, RACE_LAP_COMPLETED, RACE_STARTED, RACE_WRITE_FAILED,
};
use serde_json::json;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Timer resolution.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Collaborators shared by every clock.
#[derive(Clone)]
pub struct ClockDeps {
    pub store: Arc<dyn RaceStore>,
    pub clock: Arc<dyn Clock>,
    pub event_bus: Arc<EventBus>,
}

/// A queued persistence write.
struct WriteRequest {
    effect: TimerEffect,
    /// Set when the caller waits for the outcome.
    reply: Option<oneshot::Sender<CoreResult<()>>>,
}

/// Handles of a clock's background tasks.
pub struct ClockTasks {
    pub ticker: JoinHandle<()>,
    pub writer: JoinHandle<()>,
}

pub struct RaceClock {
    race_id: DbId,
    owner_id: String,
    timer: Mutex<RaceTimer>,
    writes: mpsc::UnboundedSender<WriteRequest>,
    clock: Arc<dyn Clock>,
}

impl RaceClock {
    /// Project `race` into a timer and spawn its tick and writer tasks.
    ///
    /// Both tasks exit once `cancel` fires.
    pub fn spawn(
        race: &Race,
        deps: &ClockDeps,
        cancel: CancellationToken,
    ) -> (Arc<Self>, ClockTasks) {
        let (timer, effects) = RaceTimer::load(race, deps.clock.now());
        let (writes, queue) = mpsc::unbounded_channel();

        let clock = Arc::new(Self {
            race_id: race.id,
            owner_id: race.owner_id.clone(),
            timer: Mutex::new(timer),
            writes,
            clock: Arc::clone(&deps.clock),
        });
        clock.enqueue(effects);

        let writer = RaceWriter {
            race_id: race.id,
            owner_id: race.owner_id.clone(),
            store: Arc::clone(&deps.store),
            event_bus: Arc::clone(&deps.event_bus),
        };
        let writer = tokio::spawn(writer.run(queue, cancel.clone()));

        // The first tick is one full second after load, not immediate.
        let first_tick = Instant::now() + TICK_INTERVAL;
        let ticker = tokio::spawn(Arc::clone(&clock).run_ticks(first_tick, cancel));

        (clock, ClockTasks { ticker, writer })
    }

    pub fn race_id(&self) -> DbId {
        self.race_id
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        self.timer.lock().await.snapshot()
    }

    /// Manual start. Waits for the status write.
    pub async fn start(&self) -> CoreResult<TimerSnapshot> {
        self.transition(|timer, now| timer.start(now)).await
    }

    /// Irreversible stop. Waits for the status write.
    pub async fn stop(&self, confirmed: bool) -> CoreResult<TimerSnapshot> {
        self.transition(|timer, _| timer.stop(confirmed)).await
    }

    /// Manual lap boundary. The lap write is queued like a natural boundary.
    pub async fn complete_lap(&self) -> CoreResult<TimerSnapshot> {
        let mut timer = self.timer.lock().await;
        let effects = timer.complete_lap()?;
        if let Some(lap) = recorded_lap(&effects) {
            tracing::info!(race_id = self.race_id, lap, "Lap completed manually");
        }
        self.enqueue(effects);
        Ok(timer.snapshot())
    }

    /// Compute the transition on a copy and commit it only after its
    /// writes succeeded. The lock is held throughout, so no tick interleaves.
    async fn transition<F>(&self, apply: F) -> CoreResult<TimerSnapshot>
    where
        F: FnOnce(&mut RaceTimer, Timestamp) -> Result<Vec<TimerEffect>, TimerError>,
    {
        let mut timer = self.timer.lock().await;
        let mut next = timer.clone();
        let effects = apply(&mut next, self.clock.now())?;

        for effect in effects {
            self.write_and_wait(effect).await?;
        }

        *timer = next;
        Ok(timer.snapshot())
    }

    async fn write_and_wait(&self, effect: TimerEffect) -> CoreResult<()> {
        let (reply, outcome) = oneshot::channel();
        self.writes
            .send(WriteRequest {
                effect,
                reply: Some(reply),
            })
            .map_err(|_| unloaded())?;
        outcome.await.map_err(|_| unloaded())?
    }

    fn enqueue(&self, effects: Vec<TimerEffect>) {
        for effect in effects {
            if self
                .writes
                .send(WriteRequest {
                    effect,
                    reply: None,
                })
                .is_err()
            {
                tracing::warn!(race_id = self.race_id, "Race writer gone, dropping write");
            }
        }
    }

    async fn run_ticks(self: Arc<Self>, first_tick: Instant, cancel: CancellationToken) {
        let mut interval = tokio::time::interval_at(first_tick, TICK_INTERVAL);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let mut timer = self.timer.lock().await;
                    let effects = timer.on_tick(self.clock.now());
                    self.enqueue(effects);
                    if timer.is_completed() {
                        break;
                    }
                }
            }
        }

        tracing::debug!(race_id = self.race_id, "Race clock ticker stopped");
    }
}

fn unloaded() -> CoreError {
    CoreError::Conflict("race timer was unloaded".into())
}

fn recorded_lap(effects: &[TimerEffect]) -> Option<u32> {
    effects.iter().find_map(|effect| match effect {
        TimerEffect::RecordLap { current_lap } => Some(*current_lap),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Drains a clock's write queue in order.
struct RaceWriter {
    race_id: DbId,
    owner_id: String,
    store: Arc<dyn RaceStore>,
    event_bus: Arc<EventBus>,
}

impl RaceWriter {
    async fn run(self, mut queue: mpsc::UnboundedReceiver<WriteRequest>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                request = queue.recv() => {
                    let Some(request) = request else { break };
                    let outcome = self.apply(&request.effect).await;
                    match request.reply {
                        Some(reply) => {
                            let _ = reply.send(outcome);
                        }
                        None => {
                            if let Err(err) = outcome {
                                self.report_failure(&request.effect, &err);
                            }
                        }
                    }
                }
            }
        }

        tracing::debug!(race_id = self.race_id, "Race writer stopped");
    }

    async fn apply(&self, effect: &TimerEffect) -> CoreResult<()> {
        let (owner, id) = (self.owner_id.as_str(), self.race_id);
        let written = match *effect {
            TimerEffect::MarkActive { started_at } => {
                self.store.mark_active(owner, id, started_at).await?
            }
            TimerEffect::RecordLap { current_lap } => {
                self.store.record_lap(owner, id, current_lap).await?
            }
            TimerEffect::MarkCompleted => self.store.mark_completed(owner, id).await?,
        };

        if !written {
            return Err(CoreError::Conflict(format!(
                "race {id} was completed or deleted elsewhere"
            )));
        }

        let (event_type, payload) = match *effect {
            TimerEffect::MarkActive { started_at } => {
                tracing::info!(race_id = id, owner_id = owner, %started_at, "Race started");
                (RACE_STARTED, json!({ "started_at": started_at }))
            }
            TimerEffect::RecordLap { current_lap } => {
                tracing::info!(race_id = id, lap = current_lap, "Lap recorded");
                (RACE_LAP_COMPLETED, json!({ "current_lap": current_lap }))
            }
            TimerEffect::MarkCompleted => {
                tracing::info!(race_id = id, owner_id = owner, "Race completed");
                (RACE_COMPLETED, json!({}))
            }
        };
        self.event_bus.publish(
            RaceEvent::new(event_type, id)
                .with_owner(owner)
                .with_payload(payload),
        );
        Ok(())
    }

    fn report_failure(&self, effect: &TimerEffect, err: &CoreError) {
        let operation = match effect {
            TimerEffect::MarkActive { .. } => "mark_active",
            TimerEffect::RecordLap { .. } => "record_lap",
            TimerEffect::MarkCompleted => "mark_completed",
        };
        tracing::error!(
            race_id = self.race_id,
            operation,
            error = %err,
            "Race write failed, local timer continues"
        );

        let mut payload = json!({ "operation": operation, "error": err.to_string() });
        if let TimerEffect::RecordLap { current_lap } = effect {
            payload["current_lap"] = json!(current_lap);
        }
        self.event_bus.publish(
            RaceEvent::new(RACE_WRITE_FAILED, self.race_id)
                .with_owner(self.owner_id.as_str())
                .with_payload(payload),
        );
    }
}
